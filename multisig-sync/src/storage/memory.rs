// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{LedgerStorageTrait, TransactionFilter};
use crate::models::{
    AccountId, MultisigAccount, MultisigEvent, MultisigTransaction, TransactionKey,
};
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{watch, Mutex};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountId, MultisigAccount>,
    transactions: BTreeMap<TransactionKey, MultisigTransaction>,
    events: BTreeMap<u64, MultisigEvent>,
    next_event_id: u64,
}

/// An in-memory, transient ledger implementation.
#[derive(Debug)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    revision: watch::Sender<u64>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            state: Mutex::new(LedgerState::default()),
            revision,
        }
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}

#[async_trait::async_trait]
impl LedgerStorageTrait for MemoryLedger {
    async fn get_account(&self, account_id: &str) -> Result<Option<MultisigAccount>> {
        Ok(self.state.lock().await.accounts.get(account_id).cloned())
    }

    async fn get_accounts(&self) -> Result<Vec<MultisigAccount>> {
        Ok(self.state.lock().await.accounts.values().cloned().collect())
    }

    async fn create_account(&self, account: MultisigAccount) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.accounts.contains_key(&account.account_id) {
                bail!("Account {} already exists", account.account_id);
            }
            state.accounts.insert(account.account_id.clone(), account);
        }
        self.bump_revision();
        Ok(())
    }

    async fn update_account(&self, account: MultisigAccount) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let stored = state
                .accounts
                .get_mut(&account.account_id)
                .with_context(|| format!("Account {} not found", account.account_id))?;
            *stored = account;
        }
        self.bump_revision();
        Ok(())
    }

    async fn get_transaction(&self, key: &TransactionKey) -> Result<Option<MultisigTransaction>> {
        Ok(self.state.lock().await.transactions.get(key).cloned())
    }

    async fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<MultisigTransaction>> {
        Ok(self
            .state
            .lock()
            .await
            .transactions
            .values()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }

    async fn create_transaction(&self, tx: MultisigTransaction) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let key = tx.key();
            if state.transactions.contains_key(&key) {
                bail!("Transaction {:?} already exists", key);
            }
            state.transactions.insert(key, tx);
        }
        self.bump_revision();
        Ok(())
    }

    async fn update_transaction(&self, tx: MultisigTransaction) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            let key = tx.key();
            let stored = state
                .transactions
                .get_mut(&key)
                .with_context(|| format!("Transaction {:?} not found", key))?;
            *stored = tx;
        }
        self.bump_revision();
        Ok(())
    }

    async fn delete_transaction(&self, key: &TransactionKey) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            state.transactions.remove(key);
            state.events.retain(|_, event| &event.tx_key != key);
        }
        self.bump_revision();
        Ok(())
    }

    async fn get_events(&self, key: &TransactionKey) -> Result<Vec<MultisigEvent>> {
        Ok(self
            .state
            .lock()
            .await
            .events
            .values()
            .filter(|event| &event.tx_key == key)
            .cloned()
            .collect())
    }

    async fn create_event(&self, mut event: MultisigEvent) -> Result<u64> {
        let id = {
            let mut state = self.state.lock().await;
            state.next_event_id += 1;
            let id = state.next_event_id;
            event.id = Some(id);
            state.events.insert(id, event);
            id
        };
        self.bump_revision();
        Ok(id)
    }

    async fn update_event(&self, event: MultisigEvent) -> Result<()> {
        {
            let id = event.id.context("Cannot update an event without an id")?;
            let mut state = self.state.lock().await;
            let stored = state
                .events
                .get_mut(&id)
                .with_context(|| format!("Event {} not found", id))?;
            *stored = event;
        }
        self.bump_revision();
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
