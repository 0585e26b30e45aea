// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{ChainReconciler, ReconcilerHandle};
use crate::{
    models::{AccountId, MultisigAccount},
    SYNC_SERVICE_TYPE,
};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tracing::info;

/// Running reconciliation loops keyed by multisig account id. Each tracked account gets one
/// loop per configured chain.
pub struct ReconcilerRegistry {
    reconcilers: Vec<Arc<ChainReconciler>>,
    loops: DashMap<AccountId, Vec<ReconcilerHandle>>,
}

impl ReconcilerRegistry {
    pub fn new(reconcilers: Vec<Arc<ChainReconciler>>) -> Self {
        Self {
            reconcilers,
            loops: DashMap::new(),
        }
    }

    /// Starts tracking `account`. Returns false if it is already tracked.
    pub fn subscribe(&self, account: &MultisigAccount) -> bool {
        match self.loops.entry(account.account_id.clone()) {
            Entry::Occupied(_) => return false,
            Entry::Vacant(vacant) => {
                let handles = self
                    .reconcilers
                    .iter()
                    .map(|reconciler| reconciler.start(account.clone()))
                    .collect();
                vacant.insert(handles);
            },
        }
        info!(
            service_type = SYNC_SERVICE_TYPE,
            account_id = account.account_id,
            chains = self.reconcilers.len(),
            "[MultisigSync] Subscribed account to chain reconciliation"
        );
        true
    }

    /// Stops every loop of `account_id`. Returns false if it wasn't tracked.
    pub fn unsubscribe(&self, account_id: &str) -> bool {
        match self.loops.remove(account_id) {
            Some((_, handles)) => {
                handles.iter().for_each(ReconcilerHandle::stop);
                info!(
                    service_type = SYNC_SERVICE_TYPE,
                    account_id = account_id,
                    "[MultisigSync] Unsubscribed account from chain reconciliation"
                );
                true
            },
            None => false,
        }
    }

    pub fn is_tracking(&self, account_id: &str) -> bool {
        self.loops.contains_key(account_id)
    }

    pub fn tracked_accounts(&self) -> Vec<AccountId> {
        self.loops.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Stops every loop and waits for them to exit.
    pub async fn stop_all(&self) {
        let account_ids = self.tracked_accounts();
        let mut handles = vec![];
        for account_id in account_ids {
            if let Some((_, account_handles)) = self.loops.remove(&account_id) {
                handles.extend(account_handles);
            }
        }
        futures::future::join_all(handles.into_iter().map(ReconcilerHandle::shutdown)).await;
    }
}
