// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::models::{
    AccountId, CallHash, CallOutcome, ChainId, MultisigTxStatus, RoomId, Timepoint,
    TransactionKey,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The multisig account as described by the sender.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MstAccountPayload {
    pub account_id: AccountId,
    pub signatories: Vec<AccountId>,
    pub threshold: u16,
    pub account_name: String,
    pub creator_account_id: AccountId,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvitePayload {
    pub mst_account: MstAccountPayload,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultisigPayload {
    pub mst_account: MstAccountPayload,
    pub call_hash: CallHash,
    #[serde(default)]
    pub call_data: Option<String>,
    pub chain_id: ChainId,
    pub call_timepoint: Timepoint,
    pub extrinsic_timepoint: Timepoint,
    #[serde(default)]
    pub extrinsic_hash: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub call_outcome: Option<CallOutcome>,
}

impl MultisigPayload {
    pub fn tx_key(&self) -> TransactionKey {
        TransactionKey::new(
            &self.mst_account.account_id,
            &self.chain_id,
            &self.call_hash,
            self.call_timepoint,
        )
    }

    /// Terminal transaction status carried by a final approval.
    pub fn final_status(&self) -> MultisigTxStatus {
        match self.call_outcome {
            Some(CallOutcome::Error) => MultisigTxStatus::Error,
            Some(CallOutcome::Executed) | None => MultisigTxStatus::Executed,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(tag = "type", content = "content", rename_all = "kebab-case")]
pub enum MessageContent {
    Invite(InvitePayload),
    Update(MultisigPayload),
    Cancel(MultisigPayload),
    Approve(MultisigPayload),
    FinalApprove(MultisigPayload),
}

impl MessageContent {
    pub fn message_type(&self) -> &'static str {
        match self {
            Self::Invite(_) => "invite",
            Self::Update(_) => "update",
            Self::Cancel(_) => "cancel",
            Self::Approve(_) => "approve",
            Self::FinalApprove(_) => "final-approve",
        }
    }
}

/// A message delivered by the off-chain channel.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultisigMessage {
    pub room_id: RoomId,
    /// Account id of the sending signatory.
    pub sender: AccountId,
    #[serde(flatten)]
    pub content: MessageContent,
}

impl MultisigMessage {
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("Failed to parse multisig message")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_final_approve() {
        let raw = r#"{
            "roomId": "!room:matrix.org",
            "sender": "0x01",
            "type": "final-approve",
            "content": {
                "mstAccount": {
                    "accountId": "0xaa",
                    "signatories": ["0x01", "0x02"],
                    "threshold": 2,
                    "accountName": "Treasury",
                    "creatorAccountId": "0x01"
                },
                "callHash": "0xcall",
                "chainId": "polkadot",
                "callTimepoint": {"height": 10, "index": 1},
                "extrinsicTimepoint": {"height": 12, "index": 3},
                "extrinsicHash": "0xext",
                "callOutcome": "Error"
            }
        }"#;
        let message = MultisigMessage::from_json(raw).unwrap();
        assert_eq!(message.content.message_type(), "final-approve");
        let MessageContent::FinalApprove(payload) = message.content else {
            panic!("Expected a final approval");
        };
        assert_eq!(payload.tx_key().block_created, 10);
        assert_eq!(payload.final_status(), MultisigTxStatus::Error);
        assert!(!payload.error);
        assert!(payload.call_data.is_none());
    }

    #[test]
    fn test_parse_invite() {
        let raw = r#"{
            "roomId": "!room:matrix.org",
            "sender": "0x01",
            "type": "invite",
            "content": {
                "mstAccount": {
                    "accountId": "0xaa",
                    "signatories": ["0x01"],
                    "threshold": 1,
                    "accountName": "Solo",
                    "creatorAccountId": "0x01"
                }
            }
        }"#;
        let message = MultisigMessage::from_json(raw).unwrap();
        assert!(matches!(message.content, MessageContent::Invite(_)));
    }

    #[test]
    fn test_unknown_message_type_is_rejected() {
        let raw = r#"{"roomId": "!r", "sender": "0x01", "type": "reject", "content": {}}"#;
        assert!(MultisigMessage::from_json(raw).is_err());
    }
}
