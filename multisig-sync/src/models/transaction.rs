// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{AccountId, CallHash, ChainId, Signatory, Timepoint};
use crate::{
    chain::DecodedCall,
    utils::{standardize_account_id, standardize_hex},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultisigTxStatus {
    Signing,
    Established,
    Executed,
    Cancelled,
    Error,
}

impl MultisigTxStatus {
    /// Final statuses the reconciler never revisits.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Executed | Self::Cancelled | Self::Error)
    }
}

/// Composite primary key of a multisig transaction.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TransactionKey {
    pub account_id: AccountId,
    pub chain_id: ChainId,
    pub call_hash: CallHash,
    pub block_created: u64,
    pub index_created: u32,
}

impl TransactionKey {
    /// Account id and call hash are standardized, so keys built from chain data and from
    /// channel messages compare equal.
    pub fn new(account_id: &str, chain_id: &str, call_hash: &str, timepoint: Timepoint) -> Self {
        Self {
            account_id: standardize_account_id(account_id),
            chain_id: chain_id.to_string(),
            call_hash: standardize_hex(call_hash),
            block_created: timepoint.height,
            index_created: timepoint.index,
        }
    }

    pub fn timepoint(&self) -> Timepoint {
        Timepoint {
            height: self.block_created,
            index: self.index_created,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MultisigTransaction {
    pub account_id: AccountId,
    pub chain_id: ChainId,
    pub call_hash: CallHash,
    pub block_created: u64,
    pub index_created: u32,
    pub signatories: Vec<Signatory>,
    pub call_data: Option<String>,
    pub decoded_call: Option<DecodedCall>,
    pub status: MultisigTxStatus,
    pub deposit: Option<u128>,
    pub depositor: Option<AccountId>,
    pub date_created: DateTime<Utc>,
    pub description: Option<String>,
    pub cancel_description: Option<String>,
}

impl MultisigTransaction {
    pub fn new(key: &TransactionKey, signatories: Vec<Signatory>, date_created: DateTime<Utc>) -> Self {
        Self {
            account_id: key.account_id.clone(),
            chain_id: key.chain_id.clone(),
            call_hash: key.call_hash.clone(),
            block_created: key.block_created,
            index_created: key.index_created,
            signatories,
            call_data: None,
            decoded_call: None,
            status: MultisigTxStatus::Signing,
            deposit: None,
            depositor: None,
            date_created,
            description: None,
            cancel_description: None,
        }
    }

    pub fn key(&self) -> TransactionKey {
        TransactionKey {
            account_id: self.account_id.clone(),
            chain_id: self.chain_id.clone(),
            call_hash: self.call_hash.clone(),
            block_created: self.block_created,
            index_created: self.index_created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_standardizes_hex_fields() {
        let timepoint = Timepoint {
            height: 7,
            index: 2,
        };
        let lower = TransactionKey::new("0xab", "polkadot", "0xaa", timepoint);
        let upper = TransactionKey::new("0XAB", "polkadot", "AA", timepoint);
        assert_eq!(lower, upper);
        assert_eq!(lower.call_hash, "0xaa");
        assert_eq!(
            lower.account_id,
            "0x00000000000000000000000000000000000000000000000000000000000000ab"
        );
    }
}
