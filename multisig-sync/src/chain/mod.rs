// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::models::{AccountId, CallHash, ChainId, Timepoint};
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};

/// A multisig call that is recorded on chain but not yet executed or cancelled.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct PendingCall {
    pub call_hash: CallHash,
    pub timepoint: Timepoint,
    pub deposit: u128,
    pub depositor: AccountId,
    pub approvals: Vec<AccountId>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct DecodedCall {
    pub section: String,
    pub method: String,
    pub args: serde_json::Value,
}

/// Read access to one chain's multisig storage.
#[async_trait::async_trait]
pub trait ChainQueryTrait: 'static + Send + Sync {
    /// Pending multisig calls of the account.
    async fn get_pending_calls(&self, account_id: &str) -> Result<Vec<PendingCall>>;

    async fn get_current_block_number(&self) -> Result<u64>;

    /// Expected block time in milliseconds.
    async fn get_block_time(&self) -> Result<u64>;

    /// Returns None if the call data can't be decoded.
    async fn decode_call_data(&self, address: &str, call_data: &str) -> Option<DecodedCall>;
}

/// Estimates when `height` was produced from the current height and block time. Never
/// returns a date later than `now`.
pub async fn estimate_block_date(
    chain: &dyn ChainQueryTrait,
    height: u64,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let current = chain.get_current_block_number().await?;
    let block_time = chain.get_block_time().await?;
    let blocks_ago = current.saturating_sub(height);
    let millis_ago = i64::try_from(blocks_ago.saturating_mul(block_time)).unwrap_or(i64::MAX);
    Ok(now
        .checked_sub_signed(Duration::milliseconds(millis_ago))
        .unwrap_or(DateTime::<Utc>::MIN_UTC))
}

/// Chain adapters keyed by chain id.
#[derive(Clone, Default)]
pub struct ChainRegistry {
    chains: HashMap<ChainId, Arc<dyn ChainQueryTrait>>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain(mut self, chain_id: &str, chain: Arc<dyn ChainQueryTrait>) -> Self {
        self.insert(chain_id, chain);
        self
    }

    pub fn insert(&mut self, chain_id: &str, chain: Arc<dyn ChainQueryTrait>) {
        self.chains.insert(chain_id.to_string(), chain);
    }

    pub fn get(&self, chain_id: &str) -> Option<Arc<dyn ChainQueryTrait>> {
        self.chains.get(chain_id).cloned()
    }
}
