// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{AccountId, TransactionKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MultisigEventStatus {
    PendingSigned,
    Signed,
    ErrorSigned,
    PendingCancelled,
    Cancelled,
    ErrorCancelled,
}

/// Signing intents and cancelling intents are merged independently.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventFamily {
    Signing,
    Cancelling,
}

impl EventFamily {
    pub fn pending_status(&self) -> MultisigEventStatus {
        match self {
            Self::Signing => MultisigEventStatus::PendingSigned,
            Self::Cancelling => MultisigEventStatus::PendingCancelled,
        }
    }

    pub fn confirmed_status(&self) -> MultisigEventStatus {
        match self {
            Self::Signing => MultisigEventStatus::Signed,
            Self::Cancelling => MultisigEventStatus::Cancelled,
        }
    }

    pub fn error_status(&self) -> MultisigEventStatus {
        match self {
            Self::Signing => MultisigEventStatus::ErrorSigned,
            Self::Cancelling => MultisigEventStatus::ErrorCancelled,
        }
    }
}

impl MultisigEventStatus {
    pub fn family(&self) -> EventFamily {
        match self {
            Self::PendingSigned | Self::Signed | Self::ErrorSigned => EventFamily::Signing,
            Self::PendingCancelled | Self::Cancelled | Self::ErrorCancelled => {
                EventFamily::Cancelling
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::PendingSigned | Self::PendingCancelled)
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Signed | Self::Cancelled)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
pub enum CallOutcome {
    Executed,
    Error,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct MultisigEvent {
    /// Assigned by the ledger on insert.
    pub id: Option<u64>,
    pub tx_key: TransactionKey,
    pub account_id: AccountId,
    pub status: MultisigEventStatus,
    pub extrinsic_hash: Option<String>,
    pub event_block: Option<u64>,
    pub event_index: Option<u32>,
    pub date_created: Option<DateTime<Utc>>,
    pub multisig_outcome: Option<CallOutcome>,
}

impl MultisigEvent {
    pub fn new(tx_key: &TransactionKey, account_id: &str, status: MultisigEventStatus) -> Self {
        Self {
            id: None,
            tx_key: tx_key.clone(),
            account_id: account_id.to_string(),
            status,
            extrinsic_hash: None,
            event_block: None,
            event_index: None,
            date_created: None,
            multisig_outcome: None,
        }
    }

    pub fn family(&self) -> EventFamily {
        self.status.family()
    }
}
