// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{LedgerStorageTrait, TransactionFilter};
use crate::models::MultisigTransaction;
use anyhow::Result;
use futures::{stream, Stream};
use std::sync::Arc;
use tokio::sync::watch;

/// Re-runs a transaction filter on every ledger write.
pub struct LiveQuery<L: LedgerStorageTrait + ?Sized> {
    ledger: Arc<L>,
    filter: TransactionFilter,
    revisions: watch::Receiver<u64>,
    emitted_initial: bool,
}

impl<L: LedgerStorageTrait + ?Sized> LiveQuery<L> {
    pub fn new(ledger: Arc<L>, filter: TransactionFilter) -> Self {
        let revisions = ledger.subscribe();
        Self {
            ledger,
            filter,
            revisions,
            emitted_initial: false,
        }
    }

    /// The first call returns the current result set right away; later calls wait for
    /// the next write. Returns None if the ledger closes its revision watcher.
    pub async fn next(&mut self) -> Option<Result<Vec<MultisigTransaction>>> {
        if self.emitted_initial {
            self.revisions.changed().await.ok()?;
        } else {
            self.emitted_initial = true;
        }
        // Writes that landed while we were waiting are covered by this read.
        let _ = self.revisions.borrow_and_update();
        Some(self.ledger.get_transactions(&self.filter).await)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<MultisigTransaction>>> {
        Box::pin(stream::unfold(self, |mut query| async move {
            query.next().await.map(|result| (result, query))
        }))
    }
}
