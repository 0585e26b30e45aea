// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use anyhow::{bail, Result};
use multisig_sync::{
    chain::{ChainQueryTrait, ChainRegistry, DecodedCall, PendingCall},
    config::SyncConfig,
    message_channel::{
        MessageChannelTrait, MessageContent, MstAccountPayload, MultisigMessage,
        MultisigMessageHandler, MultisigPayload,
    },
    models::{
        AccountId, MultisigAccount, MultisigEvent, MultisigTransaction, RoomId, Signatory,
        Timepoint, TransactionKey,
    },
    notification::{Notification, NotificationSinkTrait},
    reconciler::{ChainReconciler, ReconcilerRegistry},
    storage::{LedgerStorageTrait, MemoryLedger, NoContacts},
    task_queue::TaskQueue,
    utils::derive_multisig_account_id,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Mutex;

mod scenarios_tests;

pub const CHAIN_ID: &str = "polkadot";
pub const ROOM_ID: &str = "!treasury:matrix.org";

pub const S1: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";
pub const S2: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";
pub const S3: &str = "0x3333333333333333333333333333333333333333333333333333333333333333";
pub const OUTSIDER: &str = "0x9999999999999999999999999999999999999999999999999999999999999999";

/// Chain stand-in whose pending set the test controls.
pub struct FakeChain {
    pending_calls: Mutex<Vec<PendingCall>>,
    unavailable: AtomicBool,
    fetch_delay_ms: AtomicU64,
    fetches: AtomicUsize,
    current_block: u64,
    block_time_ms: u64,
}

impl FakeChain {
    pub fn new(current_block: u64, block_time_ms: u64) -> Self {
        Self {
            pending_calls: Mutex::new(vec![]),
            unavailable: AtomicBool::new(false),
            fetch_delay_ms: AtomicU64::new(0),
            fetches: AtomicUsize::new(0),
            current_block,
            block_time_ms,
        }
    }

    pub async fn set_pending_calls(&self, calls: Vec<PendingCall>) {
        *self.pending_calls.lock().await = calls;
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes every pending-call fetch take `delay` before answering.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.fetch_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of pending-call fetches started so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ChainQueryTrait for FakeChain {
    async fn get_pending_calls(&self, _account_id: &str) -> Result<Vec<PendingCall>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay_ms = self.fetch_delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            bail!("Chain node unreachable");
        }
        Ok(self.pending_calls.lock().await.clone())
    }

    async fn get_current_block_number(&self) -> Result<u64> {
        Ok(self.current_block)
    }

    async fn get_block_time(&self) -> Result<u64> {
        Ok(self.block_time_ms)
    }

    async fn decode_call_data(&self, _address: &str, call_data: &str) -> Option<DecodedCall> {
        Some(DecodedCall {
            section: "balances".to_string(),
            method: "transferKeepAlive".to_string(),
            args: serde_json::json!({ "raw": call_data }),
        })
    }
}

/// Records room membership changes.
#[derive(Default)]
pub struct FakeChannel {
    pub joined: Mutex<Vec<RoomId>>,
    pub left: Mutex<Vec<RoomId>>,
}

#[async_trait::async_trait]
impl MessageChannelTrait for FakeChannel {
    async fn join_room(&self, room_id: &str) -> Result<()> {
        self.joined.lock().await.push(room_id.to_string());
        Ok(())
    }

    async fn leave_room(&self, room_id: &str) -> Result<()> {
        self.left.lock().await.push(room_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub notifications: Mutex<Vec<Notification>>,
}

#[async_trait::async_trait]
impl NotificationSinkTrait for RecordingSink {
    async fn notify(&self, notification: Notification) -> Result<()> {
        self.notifications.lock().await.push(notification);
        Ok(())
    }
}

/// A 2-of-3 multisig of `S1`, `S2` and `S3` wired to in-memory collaborators.
pub struct TestContext {
    pub account: MultisigAccount,
    pub ledger: Arc<MemoryLedger>,
    pub chain: Arc<FakeChain>,
    pub channel: Arc<FakeChannel>,
    pub notifications: Arc<RecordingSink>,
    pub queue: TaskQueue,
    pub reconciler: Arc<ChainReconciler>,
    pub registry: Arc<ReconcilerRegistry>,
    pub handler: Arc<MultisigMessageHandler>,
}

impl TestContext {
    pub async fn new() -> Result<Self> {
        Self::with_config(SyncConfig::default()).await
    }

    pub async fn with_config(config: SyncConfig) -> Result<Self> {
        let ledger = Arc::new(MemoryLedger::new());
        let chain = Arc::new(FakeChain::new(1_000, 6_000));
        let channel = Arc::new(FakeChannel::default());
        let notifications = Arc::new(RecordingSink::default());
        let (queue, _worker) = TaskQueue::start();

        let reconciler = Arc::new(ChainReconciler::new(
            CHAIN_ID,
            chain.clone(),
            ledger.clone(),
            queue.clone(),
            config,
        ));
        let registry = Arc::new(ReconcilerRegistry::new(vec![reconciler.clone()]));
        let handler = Arc::new(
            MultisigMessageHandler::new(
                ledger.clone(),
                ChainRegistry::new().with_chain(CHAIN_ID, chain.clone()),
                queue.clone(),
                Arc::new(NoContacts),
                notifications.clone(),
                channel.clone(),
            )
            .with_reconcilers(registry.clone()),
        );

        let account = Self::multisig_account()?;
        ledger.create_account(account.clone()).await?;
        Ok(Self {
            account,
            ledger,
            chain,
            channel,
            notifications,
            queue,
            reconciler,
            registry,
            handler,
        })
    }

    pub fn signatories() -> Vec<AccountId> {
        vec![S1.to_string(), S2.to_string(), S3.to_string()]
    }

    pub fn multisig_account() -> Result<MultisigAccount> {
        let signatories = Self::signatories();
        Ok(MultisigAccount {
            account_id: derive_multisig_account_id(&signatories, 2)?,
            name: "Treasury".to_string(),
            signatories: signatories
                .iter()
                .map(|id| Signatory::from_account_id(id))
                .collect(),
            threshold: 2,
            creator_account_id: S1.to_string(),
            matrix_room_id: Some(ROOM_ID.to_string()),
        })
    }

    pub fn mst_account_payload(&self) -> MstAccountPayload {
        MstAccountPayload {
            account_id: self.account.account_id.clone(),
            signatories: Self::signatories(),
            threshold: self.account.threshold,
            account_name: self.account.name.clone(),
            creator_account_id: self.account.creator_account_id.clone(),
        }
    }

    pub fn tx_key(&self, call_hash: &str, timepoint: Timepoint) -> TransactionKey {
        TransactionKey::new(&self.account.account_id, CHAIN_ID, call_hash, timepoint)
    }

    pub fn pending_call(
        &self,
        call_hash: &str,
        timepoint: Timepoint,
        depositor: &str,
        approvals: &[&str],
    ) -> PendingCall {
        PendingCall {
            call_hash: call_hash.to_string(),
            timepoint,
            deposit: 20_000_000_000,
            depositor: depositor.to_string(),
            approvals: approvals.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn payload(&self, call_hash: &str, call_timepoint: Timepoint) -> MultisigPayload {
        MultisigPayload {
            mst_account: self.mst_account_payload(),
            call_hash: call_hash.to_string(),
            call_data: None,
            chain_id: CHAIN_ID.to_string(),
            call_timepoint,
            extrinsic_timepoint: Timepoint {
                height: call_timepoint.height + 1,
                index: 0,
            },
            extrinsic_hash: None,
            description: None,
            error: false,
            call_outcome: None,
        }
    }

    pub fn message(&self, sender: &str, content: MessageContent) -> MultisigMessage {
        MultisigMessage {
            room_id: ROOM_ID.to_string(),
            sender: sender.to_string(),
            content,
        }
    }

    /// Runs one reconciliation pass and waits for the work it queued.
    pub async fn reconcile(&self) -> Result<()> {
        self.reconciler.reconcile_once(&self.account).await?;
        self.queue.flush().await;
        Ok(())
    }

    /// Handles one message and waits for the work it queued.
    pub async fn deliver(&self, message: MultisigMessage) -> Result<()> {
        self.handler.handle(message).await?;
        self.queue.flush().await;
        Ok(())
    }

    pub async fn transaction(&self, key: &TransactionKey) -> Option<MultisigTransaction> {
        self.ledger.get_transaction(key).await.unwrap()
    }

    pub async fn events(&self, key: &TransactionKey) -> Vec<MultisigEvent> {
        self.ledger.get_events(key).await.unwrap()
    }

    pub async fn event_for(&self, key: &TransactionKey, account_id: &str) -> Vec<MultisigEvent> {
        self.events(key)
            .await
            .into_iter()
            .filter(|event| event.account_id == account_id)
            .collect()
    }
}
