// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::models::{AccountId, RoomId, Signatory};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    /// A multisig account was created locally from a room invite.
    MultisigInvite,
    /// An existing multisig account moved to a different room.
    MultisigRoomMigrated,
}

#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub room_id: RoomId,
    pub account_id: AccountId,
    pub account_name: String,
    pub signatories: Vec<Signatory>,
    pub threshold: u16,
    pub originator_account_id: AccountId,
    pub date_created: DateTime<Utc>,
    pub read: bool,
}

#[async_trait::async_trait]
pub trait NotificationSinkTrait: 'static + Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<()>;
}
