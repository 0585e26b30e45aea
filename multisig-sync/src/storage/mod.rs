// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

mod live_query;
mod memory;

pub use live_query::LiveQuery;
pub use memory::MemoryLedger;

use crate::models::{
    AccountId, ChainId, MultisigAccount, MultisigEvent, MultisigTransaction, MultisigTxStatus,
    TransactionKey,
};
use anyhow::Result;
use tokio::sync::watch;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransactionFilter {
    pub account_id: Option<AccountId>,
    pub chain_id: Option<ChainId>,
    pub status: Option<MultisigTxStatus>,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &MultisigTransaction) -> bool {
        self.account_id
            .as_ref()
            .map_or(true, |account_id| &tx.account_id == account_id)
            && self
                .chain_id
                .as_ref()
                .map_or(true, |chain_id| &tx.chain_id == chain_id)
            && self.status.map_or(true, |status| tx.status == status)
    }
}

/// Persistent store of multisig accounts, transactions and their events.
#[async_trait::async_trait]
pub trait LedgerStorageTrait: 'static + Send + Sync {
    async fn get_account(&self, account_id: &str) -> Result<Option<MultisigAccount>>;

    async fn get_accounts(&self) -> Result<Vec<MultisigAccount>>;

    async fn create_account(&self, account: MultisigAccount) -> Result<()>;

    async fn update_account(&self, account: MultisigAccount) -> Result<()>;

    async fn get_transaction(&self, key: &TransactionKey) -> Result<Option<MultisigTransaction>>;

    async fn get_transactions(&self, filter: &TransactionFilter) -> Result<Vec<MultisigTransaction>>;

    async fn create_transaction(&self, tx: MultisigTransaction) -> Result<()>;

    /// Overwrites the stored transaction with the same key.
    async fn update_transaction(&self, tx: MultisigTransaction) -> Result<()>;

    /// Removes the transaction together with its events.
    async fn delete_transaction(&self, key: &TransactionKey) -> Result<()>;

    async fn get_events(&self, key: &TransactionKey) -> Result<Vec<MultisigEvent>>;

    /// Inserts the event and returns the id assigned to it.
    async fn create_event(&self, event: MultisigEvent) -> Result<u64>;

    async fn update_event(&self, event: MultisigEvent) -> Result<()>;

    /// Watcher over a revision number that is bumped on every write.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Display data about known accounts, used to fill in signatory names.
#[async_trait::async_trait]
pub trait ContactsStorageTrait: 'static + Send + Sync {
    async fn get_contact_name(&self, account_id: &str) -> Result<Option<String>>;
}

/// Contact book with no entries.
#[derive(Debug, Default)]
pub struct NoContacts;

#[async_trait::async_trait]
impl ContactsStorageTrait for NoContacts {
    async fn get_contact_name(&self, _account_id: &str) -> Result<Option<String>> {
        Ok(None)
    }
}
