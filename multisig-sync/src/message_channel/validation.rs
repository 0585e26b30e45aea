// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::payload::{MstAccountPayload, MultisigPayload};
use crate::{
    models::{AccountId, CallHash},
    utils::{call_data_hash, derive_multisig_account_id, is_same_account},
};
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    #[error("Multisig account {0} does not derive from its signatories and threshold")]
    ForgedAccount(AccountId),
    #[error("Sender {sender} is not a signatory of {account_id}")]
    SenderNotSignatory {
        sender: AccountId,
        account_id: AccountId,
    },
    #[error("Call data hashes to {actual}, expected {expected}")]
    CallHashMismatch { expected: CallHash, actual: CallHash },
    #[error("Invalid hex in {0}")]
    InvalidHex(&'static str),
    #[error("Multisig account {0} is not tracked locally")]
    UnknownAccount(AccountId),
}

impl ValidationError {
    /// Short label used in metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ForgedAccount(_) => "forged_account",
            Self::SenderNotSignatory { .. } => "sender_not_signatory",
            Self::CallHashMismatch { .. } => "call_hash_mismatch",
            Self::InvalidHex(_) => "invalid_hex",
            Self::UnknownAccount(_) => "unknown_account",
        }
    }
}

pub fn validate_account(mst_account: &MstAccountPayload) -> Result<(), ValidationError> {
    let derived = derive_multisig_account_id(&mst_account.signatories, mst_account.threshold)
        .map_err(|_| ValidationError::InvalidHex("signatories"))?;
    if !is_same_account(&derived, &mst_account.account_id) {
        return Err(ValidationError::ForgedAccount(
            mst_account.account_id.clone(),
        ));
    }
    Ok(())
}

pub fn validate_sender(mst_account: &MstAccountPayload, sender: &str) -> Result<(), ValidationError> {
    if mst_account
        .signatories
        .iter()
        .any(|signatory| is_same_account(signatory, sender))
    {
        Ok(())
    } else {
        Err(ValidationError::SenderNotSignatory {
            sender: sender.to_string(),
            account_id: mst_account.account_id.clone(),
        })
    }
}

pub fn validate_call_data(call_hash: &str, call_data: Option<&str>) -> Result<(), ValidationError> {
    let Some(call_data) = call_data else {
        return Ok(());
    };
    let actual = call_data_hash(call_data).map_err(|_| ValidationError::InvalidHex("call data"))?;
    if !is_same_account(&actual, call_hash) {
        return Err(ValidationError::CallHashMismatch {
            expected: call_hash.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Checks applied to every message type except invites.
pub fn validate_payload(sender: &str, payload: &MultisigPayload) -> Result<(), ValidationError> {
    validate_sender(&payload.mst_account, sender)?;
    validate_account(&payload.mst_account)?;
    validate_call_data(&payload.call_hash, payload.call_data.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Timepoint;

    fn mst_account(signatories: &[&str], threshold: u16) -> MstAccountPayload {
        let signatories = signatories.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        MstAccountPayload {
            account_id: derive_multisig_account_id(&signatories, threshold).unwrap(),
            signatories,
            threshold,
            account_name: "Treasury".to_string(),
            creator_account_id: "0x01".to_string(),
        }
    }

    fn payload(call_data: Option<&str>) -> MultisigPayload {
        MultisigPayload {
            mst_account: mst_account(&["0x01", "0x02"], 2),
            call_hash: call_data_hash("0x0102").unwrap(),
            call_data: call_data.map(str::to_string),
            chain_id: "polkadot".to_string(),
            call_timepoint: Timepoint::default(),
            extrinsic_timepoint: Timepoint::default(),
            extrinsic_hash: None,
            description: None,
            error: false,
            call_outcome: None,
        }
    }

    #[test]
    fn test_valid_payload() {
        assert_eq!(validate_payload("0x02", &payload(Some("0x0102"))), Ok(()));
        assert_eq!(validate_payload("0x02", &payload(None)), Ok(()));
    }

    #[test]
    fn test_sender_must_be_signatory() {
        let err = validate_payload("0x03", &payload(None)).unwrap_err();
        assert_eq!(err.reason(), "sender_not_signatory");
    }

    #[test]
    fn test_forged_account_is_rejected() {
        let mut payload = payload(None);
        payload.mst_account.threshold = 1;
        assert_eq!(
            validate_payload("0x01", &payload),
            Err(ValidationError::ForgedAccount(
                payload.mst_account.account_id.clone()
            ))
        );
    }

    #[test]
    fn test_call_data_must_match_hash() {
        let err = validate_payload("0x01", &payload(Some("0x0103"))).unwrap_err();
        assert_eq!(err.reason(), "call_hash_mismatch");
        let err = validate_payload("0x01", &payload(Some("0xzz"))).unwrap_err();
        assert_eq!(err, ValidationError::InvalidHex("call data"));
    }
}
