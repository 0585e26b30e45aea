// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod account;
pub mod event;
pub mod transaction;

pub use account::{MultisigAccount, Signatory};
pub use event::{CallOutcome, EventFamily, MultisigEvent, MultisigEventStatus};
pub use transaction::{MultisigTransaction, MultisigTxStatus, TransactionKey};

use serde::{Deserialize, Serialize};

pub type AccountId = String;
pub type CallHash = String;
pub type ChainId = String;
pub type RoomId = String;

/// (block height, extrinsic index) identifying an extrinsic on chain.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq, Hash)]
pub struct Timepoint {
    pub height: u64,
    pub index: u32,
}
