// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

mod registry;

pub use registry::ReconcilerRegistry;

use crate::{
    chain::{estimate_block_date, ChainQueryTrait, PendingCall},
    config::SyncConfig,
    counters::{PENDING_CALLS, RECONCILIATION_ITERATIONS_COUNT},
    event_merger::{diff_approvals, resolve_final_status},
    models::{
        AccountId, ChainId, MultisigAccount, MultisigTransaction, MultisigTxStatus, TransactionKey,
    },
    storage::{LedgerStorageTrait, TransactionFilter},
    task_queue::TaskQueue,
    utils::{is_same_account, standardize_account_id},
    SYNC_SERVICE_TYPE,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::{collections::HashSet, sync::Arc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Handle to one account's reconciliation loop.
#[derive(Debug)]
pub struct ReconcilerHandle {
    pub account_id: AccountId,
    pub chain_id: ChainId,
    cancel_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stops the loop after the iteration in flight, if any, completes.
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        let _ = self.join_handle.await;
    }
}

/// Write computed for a pending call before anything is committed.
enum PendingCallUpdate {
    Refresh {
        tx: MultisigTransaction,
        changed: bool,
        approvals: Vec<AccountId>,
    },
    Create {
        tx: MultisigTransaction,
        approvals: Vec<AccountId>,
    },
}

/// Polls one chain's pending multisig calls and brings the ledger in line with them.
pub struct ChainReconciler {
    chain_id: ChainId,
    chain: Arc<dyn ChainQueryTrait>,
    ledger: Arc<dyn LedgerStorageTrait>,
    queue: TaskQueue,
    config: SyncConfig,
}

impl ChainReconciler {
    pub fn new(
        chain_id: &str,
        chain: Arc<dyn ChainQueryTrait>,
        ledger: Arc<dyn LedgerStorageTrait>,
        queue: TaskQueue,
        config: SyncConfig,
    ) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            chain,
            ledger,
            queue,
            config,
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Spawns the polling loop for `account`.
    pub fn start(self: &Arc<Self>, account: MultisigAccount) -> ReconcilerHandle {
        let cancel_token = CancellationToken::new();
        let reconciler = self.clone();
        let loop_token = cancel_token.clone();
        let account_id = account.account_id.clone();
        let join_handle = tokio::spawn(async move {
            reconciler.run(account, loop_token).await;
        });
        ReconcilerHandle {
            account_id,
            chain_id: self.chain_id.clone(),
            cancel_token,
            join_handle,
        }
    }

    async fn run(&self, account: MultisigAccount, cancel_token: CancellationToken) {
        info!(
            service_type = SYNC_SERVICE_TYPE,
            chain_id = self.chain_id,
            account_id = account.account_id,
            poll_interval_ms = self.config.poll_interval_ms,
            "[MultisigSync] Starting reconciliation loop"
        );
        // The sleep is the only cancellation point, so an iteration is never cut short.
        while !cancel_token.is_cancelled() {
            match self.reconcile_once(&account).await {
                Ok(()) => {
                    RECONCILIATION_ITERATIONS_COUNT
                        .with_label_values(&[&self.chain_id, "success"])
                        .inc();
                },
                Err(e) => {
                    RECONCILIATION_ITERATIONS_COUNT
                        .with_label_values(&[&self.chain_id, "error"])
                        .inc();
                    warn!(
                        service_type = SYNC_SERVICE_TYPE,
                        chain_id = self.chain_id,
                        account_id = account.account_id,
                        error = ?e,
                        "[MultisigSync] Reconciliation iteration failed, retrying on next tick"
                    );
                },
            }
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval()) => {},
            }
        }
        info!(
            service_type = SYNC_SERVICE_TYPE,
            chain_id = self.chain_id,
            account_id = account.account_id,
            "[MultisigSync] Reconciliation loop stopped"
        );
    }

    /// One reconciliation pass. Every fetch happens before the first write, so a failed
    /// fetch leaves the ledger untouched. Event merges and final status resolution are
    /// queued and read the ledger when they run.
    pub async fn reconcile_once(&self, account: &MultisigAccount) -> Result<()> {
        let pending_calls = self
            .chain
            .get_pending_calls(&account.account_id)
            .await
            .context("Failed to fetch pending multisig calls")?;
        let signing_txs = self
            .ledger
            .get_transactions(&TransactionFilter {
                account_id: Some(standardize_account_id(&account.account_id)),
                chain_id: Some(self.chain_id.clone()),
                status: Some(MultisigTxStatus::Signing),
            })
            .await
            .context("Failed to fetch signing transactions")?;

        PENDING_CALLS
            .with_label_values(&[&self.chain_id, &account.account_id])
            .set(pending_calls.len() as i64);

        let now = Utc::now();
        let mut updates = vec![];
        for call in &pending_calls {
            if let Some(update) = self
                .plan_pending_call(account, call, &signing_txs, now)
                .await?
            {
                updates.push(update);
            }
        }

        let pending_keys = pending_calls
            .iter()
            .map(|call| self.transaction_key(account, call))
            .collect::<HashSet<_>>();
        let left_pending = signing_txs
            .iter()
            .map(|tx| tx.key())
            .filter(|key| !pending_keys.contains(key))
            .collect::<Vec<_>>();

        if self.config.enable_verbose_logging {
            info!(
                service_type = SYNC_SERVICE_TYPE,
                chain_id = self.chain_id,
                account_id = account.account_id,
                pending_calls = pending_calls.len(),
                signing_transactions = signing_txs.len(),
                updates = updates.len(),
                left_pending = left_pending.len(),
                "[MultisigSync] Computed reconciliation diff"
            );
        }

        for update in updates {
            match update {
                PendingCallUpdate::Refresh {
                    tx,
                    changed,
                    approvals,
                } => {
                    let key = tx.key();
                    if changed {
                        self.ledger
                            .update_transaction(tx)
                            .await
                            .context("Failed to update transaction")?;
                    }
                    self.enqueue_approval_merge(key, approvals, None);
                },
                PendingCallUpdate::Create { tx, approvals } => {
                    let key = tx.key();
                    let depositor_date = tx.depositor.clone().map(|d| (d, tx.date_created));
                    info!(
                        service_type = SYNC_SERVICE_TYPE,
                        chain_id = self.chain_id,
                        account_id = account.account_id,
                        call_hash = key.call_hash,
                        "[MultisigSync] Tracking new pending multisig call"
                    );
                    if let Err(e) = self.ledger.create_transaction(tx).await {
                        // A message may have created it since the pass read the ledger.
                        let existing = self
                            .ledger
                            .get_transaction(&key)
                            .await
                            .context("Failed to fetch transaction")?;
                        if existing.is_none() {
                            return Err(e.context("Failed to create transaction"));
                        }
                        debug!(
                            service_type = SYNC_SERVICE_TYPE,
                            chain_id = self.chain_id,
                            account_id = account.account_id,
                            call_hash = key.call_hash,
                            "[MultisigSync] Transaction created concurrently, merging approvals only"
                        );
                    }
                    self.enqueue_approval_merge(key, approvals, depositor_date);
                },
            }
        }

        for key in left_pending {
            self.enqueue_final_status(key);
        }
        Ok(())
    }

    fn transaction_key(&self, account: &MultisigAccount, call: &PendingCall) -> TransactionKey {
        TransactionKey::new(
            &account.account_id,
            &self.chain_id,
            &call.call_hash,
            call.timepoint,
        )
    }

    async fn plan_pending_call(
        &self,
        account: &MultisigAccount,
        call: &PendingCall,
        signing_txs: &[MultisigTransaction],
        now: DateTime<Utc>,
    ) -> Result<Option<PendingCallUpdate>> {
        let key = self.transaction_key(account, call);

        if let Some(existing) = signing_txs.iter().find(|tx| tx.key() == key) {
            let mut tx = existing.clone();
            tx.deposit = Some(call.deposit);
            tx.depositor = Some(call.depositor.clone());
            let changed = &tx != existing;
            return Ok(Some(PendingCallUpdate::Refresh {
                tx,
                changed,
                approvals: call.approvals.clone(),
            }));
        }

        if !account.is_signatory(&call.depositor) {
            debug!(
                service_type = SYNC_SERVICE_TYPE,
                chain_id = self.chain_id,
                account_id = account.account_id,
                call_hash = call.call_hash,
                depositor = call.depositor,
                "[MultisigSync] Skipping pending call from an unknown depositor"
            );
            return Ok(None);
        }

        // A record in a final status, or one that already moved on, is not recreated.
        if self
            .ledger
            .get_transaction(&key)
            .await
            .context("Failed to fetch transaction")?
            .is_some()
        {
            return Ok(None);
        }

        let date_created = estimate_block_date(self.chain.as_ref(), call.timepoint.height, now)
            .await
            .context("Failed to estimate call creation date")?;
        let mut tx = MultisigTransaction::new(&key, account.signatories.clone(), date_created);
        tx.deposit = Some(call.deposit);
        tx.depositor = Some(call.depositor.clone());
        Ok(Some(PendingCallUpdate::Create {
            tx,
            approvals: call.approvals.clone(),
        }))
    }

    /// Merges on-chain approvals into the stored signing events. If `depositor_date` is
    /// set, the depositor's event gets that creation date when it has none.
    fn enqueue_approval_merge(
        &self,
        key: TransactionKey,
        approvals: Vec<AccountId>,
        depositor_date: Option<(AccountId, DateTime<Utc>)>,
    ) {
        let ledger = self.ledger.clone();
        self.queue.enqueue("merge_chain_approvals", async move {
            let events = ledger.get_events(&key).await?;
            let diff = diff_approvals(&key, &events, &approvals);
            let date_for = |account_id: &str| {
                depositor_date
                    .as_ref()
                    .filter(|(depositor, _)| is_same_account(depositor, account_id))
                    .map(|(_, date)| *date)
            };
            for mut event in diff.to_promote {
                if event.date_created.is_none() {
                    event.date_created = date_for(&event.account_id);
                }
                ledger.update_event(event).await?;
            }
            for mut event in diff.to_create {
                event.date_created = date_for(&event.account_id);
                ledger.create_event(event).await?;
            }
            Ok(())
        });
    }

    fn enqueue_final_status(&self, key: TransactionKey) {
        let ledger = self.ledger.clone();
        self.queue.enqueue("resolve_final_status", async move {
            let Some(mut tx) = ledger.get_transaction(&key).await? else {
                return Ok(());
            };
            // A message may have settled it already.
            if tx.status != MultisigTxStatus::Signing {
                return Ok(());
            }
            let events = ledger.get_events(&key).await?;
            tx.status = resolve_final_status(&events);
            info!(
                service_type = SYNC_SERVICE_TYPE,
                chain_id = key.chain_id,
                account_id = key.account_id,
                call_hash = key.call_hash,
                status = ?tx.status,
                "[MultisigSync] Call left the pending set"
            );
            ledger.update_transaction(tx).await
        });
    }
}
