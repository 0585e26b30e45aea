// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{AccountId, RoomId};
use crate::utils::{derive_multisig_account_id, is_same_account};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Signatory {
    pub account_id: AccountId,
    pub address: String,
    pub name: Option<String>,
}

impl Signatory {
    /// A signatory with no contact data; the address falls back to the account id.
    pub fn from_account_id(account_id: &str) -> Self {
        Self {
            account_id: account_id.to_string(),
            address: account_id.to_string(),
            name: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct MultisigAccount {
    pub account_id: AccountId,
    pub name: String,
    pub signatories: Vec<Signatory>,
    pub threshold: u16,
    pub creator_account_id: AccountId,
    pub matrix_room_id: Option<RoomId>,
}

impl MultisigAccount {
    pub fn signatory_ids(&self) -> Vec<AccountId> {
        self.signatories
            .iter()
            .map(|s| s.account_id.clone())
            .collect()
    }

    pub fn is_signatory(&self, account_id: &str) -> bool {
        self.signatories
            .iter()
            .any(|s| is_same_account(&s.account_id, account_id))
    }

    /// True if `account_id` re-derives from the signatories and threshold.
    pub fn has_valid_account_id(&self) -> bool {
        match derive_multisig_account_id(&self.signatory_ids(), self.threshold) {
            Ok(derived) => is_same_account(&derived, &self.account_id),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_id_validation() {
        let signatory_ids = vec!["0x01".to_string(), "0x02".to_string()];
        let mut account = MultisigAccount {
            account_id: derive_multisig_account_id(&signatory_ids, 2).unwrap(),
            name: "Treasury".to_string(),
            signatories: signatory_ids
                .iter()
                .map(|id| Signatory::from_account_id(id))
                .collect(),
            threshold: 2,
            creator_account_id: "0x01".to_string(),
            matrix_room_id: None,
        };
        assert!(account.has_valid_account_id());
        assert!(account.is_signatory("0x02"));
        assert!(!account.is_signatory("0x03"));

        account.threshold = 1;
        assert!(!account.has_valid_account_id());
    }
}
