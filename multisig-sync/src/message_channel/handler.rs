// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use super::{
    payload::{InvitePayload, MessageContent, MstAccountPayload, MultisigMessage, MultisigPayload},
    validation::{validate_account, validate_payload, validate_sender, ValidationError},
    MessageChannelTrait,
};
use crate::{
    chain::{estimate_block_date, ChainRegistry, DecodedCall},
    counters::{MESSAGES_RECEIVED_COUNT, MESSAGES_REJECTED_COUNT},
    event_merger::{find_live_event, merge_status},
    models::{
        AccountId, CallOutcome, EventFamily, MultisigAccount, MultisigEvent, MultisigEventStatus,
        MultisigTransaction, MultisigTxStatus, Signatory, Timepoint, TransactionKey,
    },
    notification::{Notification, NotificationKind, NotificationSinkTrait},
    reconciler::ReconcilerRegistry,
    storage::{ContactsStorageTrait, LedgerStorageTrait},
    task_queue::TaskQueue,
    utils::standardize_account_id,
    SYNC_SERVICE_TYPE,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Intent {
    Approve,
    FinalApprove,
    Cancel,
}

impl Intent {
    fn family(&self) -> EventFamily {
        match self {
            Self::Approve | Self::FinalApprove => EventFamily::Signing,
            Self::Cancel => EventFamily::Cancelling,
        }
    }
}

/// Event write requested by a message, applied on the task queue against the event set
/// as it is when the task runs.
#[derive(Clone, Debug)]
struct EventUpsert {
    key: TransactionKey,
    sender: AccountId,
    family: EventFamily,
    status: MultisigEventStatus,
    extrinsic_hash: Option<String>,
    extrinsic_timepoint: Timepoint,
    date_created: DateTime<Utc>,
    outcome: Option<CallOutcome>,
}

/// Applies validated channel messages to the ledger.
pub struct MultisigMessageHandler {
    ledger: Arc<dyn LedgerStorageTrait>,
    chains: ChainRegistry,
    queue: TaskQueue,
    contacts: Arc<dyn ContactsStorageTrait>,
    notifications: Arc<dyn NotificationSinkTrait>,
    channel: Arc<dyn MessageChannelTrait>,
    reconcilers: Option<Arc<ReconcilerRegistry>>,
}

impl MultisigMessageHandler {
    pub fn new(
        ledger: Arc<dyn LedgerStorageTrait>,
        chains: ChainRegistry,
        queue: TaskQueue,
        contacts: Arc<dyn ContactsStorageTrait>,
        notifications: Arc<dyn NotificationSinkTrait>,
        channel: Arc<dyn MessageChannelTrait>,
    ) -> Self {
        Self {
            ledger,
            chains,
            queue,
            contacts,
            notifications,
            channel,
            reconcilers: None,
        }
    }

    /// Accounts created from invites get reconciled, and logout stops every loop.
    pub fn with_reconcilers(mut self, reconcilers: Arc<ReconcilerRegistry>) -> Self {
        self.reconcilers = Some(reconcilers);
        self
    }

    /// Dispatches one message. Messages that fail validation are dropped and return `Ok`;
    /// an `Err` means a collaborator failed and nothing past that point was applied.
    pub async fn handle(&self, message: MultisigMessage) -> Result<()> {
        let message_type = message.content.message_type();
        MESSAGES_RECEIVED_COUNT
            .with_label_values(&[message_type])
            .inc();
        let MultisigMessage {
            room_id,
            sender,
            content,
        } = message;
        match content {
            MessageContent::Invite(payload) => self.handle_invite(&room_id, &sender, payload).await,
            MessageContent::Update(payload) => self.handle_update(&sender, payload).await,
            MessageContent::Approve(payload) => {
                self.handle_intent(message_type, &sender, payload, Intent::Approve)
                    .await
            },
            MessageContent::FinalApprove(payload) => {
                self.handle_intent(message_type, &sender, payload, Intent::FinalApprove)
                    .await
            },
            MessageContent::Cancel(payload) => {
                self.handle_intent(message_type, &sender, payload, Intent::Cancel)
                    .await
            },
        }
    }

    /// Ends the session: every reconciliation loop stops.
    pub async fn logout(&self) {
        if let Some(reconcilers) = &self.reconcilers {
            reconcilers.stop_all().await;
        }
        info!(
            service_type = SYNC_SERVICE_TYPE,
            "[MultisigSync] Logged out, reconciliation stopped"
        );
    }

    async fn handle_invite(&self, room_id: &str, sender: &str, payload: InvitePayload) -> Result<()> {
        let mst_account = payload.mst_account;
        if let Err(e) =
            validate_account(&mst_account).and_then(|_| validate_sender(&mst_account, sender))
        {
            reject("invite", sender, &e);
            return self
                .channel
                .leave_room(room_id)
                .await
                .context("Failed to leave room of a rejected invite");
        }

        let existing = self
            .ledger
            .get_account(&standardize_account_id(&mst_account.account_id))
            .await
            .context("Failed to fetch multisig account")?;
        let Some(mut account) = existing else {
            return self.create_invited_account(room_id, sender, &mst_account).await;
        };

        match account.matrix_room_id.clone() {
            Some(current_room) if current_room == room_id => {
                debug!(
                    service_type = SYNC_SERVICE_TYPE,
                    account_id = account.account_id,
                    room_id = room_id,
                    "[MultisigSync] Invite for the current room, nothing to do"
                );
                Ok(())
            },
            Some(current_room)
                if standardize_account_id(&account.creator_account_id)
                    > standardize_account_id(&mst_account.creator_account_id) =>
            {
                info!(
                    service_type = SYNC_SERVICE_TYPE,
                    account_id = account.account_id,
                    room_id = current_room,
                    rejected_room_id = room_id,
                    "[MultisigSync] Keeping existing room"
                );
                self.channel
                    .leave_room(room_id)
                    .await
                    .context("Failed to leave duplicate room")
            },
            current_room => {
                if let Some(current_room) = &current_room {
                    self.channel
                        .leave_room(current_room)
                        .await
                        .context("Failed to leave previous room")?;
                }
                self.channel
                    .join_room(room_id)
                    .await
                    .context("Failed to join room")?;
                account.matrix_room_id = Some(room_id.to_string());
                account.creator_account_id = mst_account.creator_account_id.clone();
                self.ledger
                    .update_account(account.clone())
                    .await
                    .context("Failed to update multisig account room")?;
                info!(
                    service_type = SYNC_SERVICE_TYPE,
                    account_id = account.account_id,
                    previous_room_id = ?current_room,
                    room_id = room_id,
                    "[MultisigSync] Migrated multisig account to a new room"
                );
                if current_room.is_some() {
                    self.notify(NotificationKind::MultisigRoomMigrated, &account, sender)
                        .await?;
                }
                Ok(())
            },
        }
    }

    async fn create_invited_account(
        &self,
        room_id: &str,
        sender: &str,
        mst_account: &MstAccountPayload,
    ) -> Result<()> {
        let mut signatories = Vec::with_capacity(mst_account.signatories.len());
        for account_id in &mst_account.signatories {
            let mut signatory = Signatory::from_account_id(account_id);
            signatory.name = self
                .contacts
                .get_contact_name(account_id)
                .await
                .context("Failed to look up signatory contact")?;
            signatories.push(signatory);
        }
        let account = MultisigAccount {
            account_id: standardize_account_id(&mst_account.account_id),
            name: mst_account.account_name.clone(),
            signatories,
            threshold: mst_account.threshold,
            creator_account_id: mst_account.creator_account_id.clone(),
            matrix_room_id: Some(room_id.to_string()),
        };
        // Joined before the record exists, so a failed join leaves nothing for a
        // redelivered invite to mistake for membership.
        self.channel
            .join_room(room_id)
            .await
            .context("Failed to join room")?;
        self.ledger
            .create_account(account.clone())
            .await
            .context("Failed to create multisig account")?;
        info!(
            service_type = SYNC_SERVICE_TYPE,
            account_id = account.account_id,
            room_id = room_id,
            threshold = account.threshold,
            "[MultisigSync] Created multisig account from invite"
        );
        self.notify(NotificationKind::MultisigInvite, &account, sender)
            .await?;
        if let Some(reconcilers) = &self.reconcilers {
            reconcilers.subscribe(&account);
        }
        Ok(())
    }

    async fn notify(
        &self,
        kind: NotificationKind,
        account: &MultisigAccount,
        originator: &str,
    ) -> Result<()> {
        let notification = Notification {
            kind,
            room_id: account.matrix_room_id.clone().unwrap_or_default(),
            account_id: account.account_id.clone(),
            account_name: account.name.clone(),
            signatories: account.signatories.clone(),
            threshold: account.threshold,
            originator_account_id: originator.to_string(),
            date_created: Utc::now(),
            read: false,
        };
        self.notifications
            .notify(notification)
            .await
            .context("Failed to record notification")
    }

    /// Validates a non-invite payload and resolves its local account. `None` means the
    /// message should be dropped.
    async fn authenticate(
        &self,
        message_type: &'static str,
        sender: &str,
        payload: &MultisigPayload,
    ) -> Result<Option<MultisigAccount>> {
        if let Err(e) = validate_payload(sender, payload) {
            reject(message_type, sender, &e);
            return Ok(None);
        }
        let account = self
            .ledger
            .get_account(&standardize_account_id(&payload.mst_account.account_id))
            .await
            .context("Failed to fetch multisig account")?;
        if account.is_none() {
            let error = ValidationError::UnknownAccount(payload.mst_account.account_id.clone());
            reject(message_type, sender, &error);
        }
        Ok(account)
    }

    async fn handle_update(&self, sender: &str, payload: MultisigPayload) -> Result<()> {
        let Some(account) = self.authenticate("update", sender, &payload).await? else {
            return Ok(());
        };
        let Some(call_data) = payload.call_data.as_deref() else {
            return Ok(());
        };
        let key = payload.tx_key();
        let Some(mut tx) = self
            .ledger
            .get_transaction(&key)
            .await
            .context("Failed to fetch transaction")?
        else {
            return Ok(());
        };
        if tx.call_data.as_deref() == Some(call_data) {
            return Ok(());
        }
        tx.call_data = Some(call_data.to_string());
        tx.decoded_call = self
            .decode_call(&payload.chain_id, &account.account_id, call_data)
            .await;
        self.ledger
            .update_transaction(tx)
            .await
            .context("Failed to update transaction call data")
    }

    async fn handle_intent(
        &self,
        message_type: &'static str,
        sender: &str,
        payload: MultisigPayload,
        intent: Intent,
    ) -> Result<()> {
        let Some(account) = self.authenticate(message_type, sender, &payload).await? else {
            return Ok(());
        };
        self.upsert_transaction(&account, &payload, intent).await?;

        let family = intent.family();
        let status = if payload.error {
            family.error_status()
        } else {
            family.confirmed_status()
        };
        let date_created = self
            .estimate_date(&payload.chain_id, payload.extrinsic_timepoint.height)
            .await;
        let upsert = EventUpsert {
            key: payload.tx_key(),
            sender: sender.to_string(),
            family,
            status,
            extrinsic_hash: payload.extrinsic_hash.clone(),
            extrinsic_timepoint: payload.extrinsic_timepoint,
            date_created,
            outcome: match intent {
                Intent::FinalApprove => Some(payload.call_outcome.unwrap_or(CallOutcome::Executed)),
                Intent::Approve | Intent::Cancel => None,
            },
        };
        let ledger = self.ledger.clone();
        self.queue.enqueue("upsert_message_event", async move {
            upsert_event(ledger.as_ref(), upsert).await
        });
        Ok(())
    }

    /// Creates or refreshes the transaction a message refers to. Transaction records are
    /// last-write-wins, so this runs outside the task queue.
    async fn upsert_transaction(
        &self,
        account: &MultisigAccount,
        payload: &MultisigPayload,
        intent: Intent,
    ) -> Result<()> {
        let key = payload.tx_key();
        let existing = self
            .ledger
            .get_transaction(&key)
            .await
            .context("Failed to fetch transaction")?;
        let decoded_call = match (&payload.call_data, &existing) {
            (Some(call_data), None) => {
                self.decode_call(&payload.chain_id, &account.account_id, call_data)
                    .await
            },
            (Some(call_data), Some(tx)) if tx.call_data.is_none() => {
                self.decode_call(&payload.chain_id, &account.account_id, call_data)
                    .await
            },
            _ => None,
        };

        if let Some(existing) = existing {
            return self
                .refresh_transaction(existing, payload, intent, decoded_call)
                .await;
        }

        let date_created = self
            .estimate_date(&payload.chain_id, payload.call_timepoint.height)
            .await;
        let mut tx = MultisigTransaction::new(&key, account.signatories.clone(), date_created);
        apply_intent(&mut tx, payload, intent, decoded_call.clone());
        info!(
            service_type = SYNC_SERVICE_TYPE,
            chain_id = key.chain_id,
            account_id = key.account_id,
            call_hash = key.call_hash,
            status = ?tx.status,
            "[MultisigSync] Creating transaction from channel message"
        );
        if let Err(e) = self.ledger.create_transaction(tx).await {
            // The reconciler may have inserted it since the read above.
            let Some(existing) = self
                .ledger
                .get_transaction(&key)
                .await
                .context("Failed to fetch transaction")?
            else {
                return Err(e.context("Failed to create transaction"));
            };
            return self
                .refresh_transaction(existing, payload, intent, decoded_call)
                .await;
        }
        Ok(())
    }

    async fn refresh_transaction(
        &self,
        existing: MultisigTransaction,
        payload: &MultisigPayload,
        intent: Intent,
        decoded_call: Option<DecodedCall>,
    ) -> Result<()> {
        let mut tx = existing.clone();
        apply_intent(&mut tx, payload, intent, decoded_call);
        if tx == existing {
            return Ok(());
        }
        self.ledger
            .update_transaction(tx)
            .await
            .context("Failed to update transaction")
    }

    async fn decode_call(
        &self,
        chain_id: &str,
        account_id: &str,
        call_data: &str,
    ) -> Option<DecodedCall> {
        let chain = self.chains.get(chain_id)?;
        chain.decode_call_data(account_id, call_data).await
    }

    /// Falls back to the current time when the chain is unknown or unreachable.
    async fn estimate_date(&self, chain_id: &str, height: u64) -> DateTime<Utc> {
        let now = Utc::now();
        let Some(chain) = self.chains.get(chain_id) else {
            return now;
        };
        match estimate_block_date(chain.as_ref(), height, now).await {
            Ok(date) => date,
            Err(e) => {
                warn!(
                    service_type = SYNC_SERVICE_TYPE,
                    chain_id = chain_id,
                    error = ?e,
                    "[MultisigSync] Failed to estimate block date, using current time"
                );
                now
            },
        }
    }
}

fn reject(message_type: &'static str, sender: &str, error: &ValidationError) {
    MESSAGES_REJECTED_COUNT
        .with_label_values(&[message_type, error.reason()])
        .inc();
    warn!(
        service_type = SYNC_SERVICE_TYPE,
        message_type = message_type,
        sender = sender,
        error = %error,
        "[MultisigSync] Dropping message that failed validation"
    );
}

/// Cancellation outranks execution. Other terminal statuses are never overwritten.
fn apply_intent(
    tx: &mut MultisigTransaction,
    payload: &MultisigPayload,
    intent: Intent,
    decoded_call: Option<DecodedCall>,
) {
    if tx.call_data.is_none() && payload.call_data.is_some() {
        tx.call_data = payload.call_data.clone();
        tx.decoded_call = decoded_call;
    }
    match intent {
        Intent::Approve => {},
        Intent::FinalApprove => {
            if !tx.status.is_final() {
                tx.status = payload.final_status();
            }
        },
        Intent::Cancel => {
            tx.status = MultisigTxStatus::Cancelled;
            if payload.description.is_some() {
                tx.cancel_description = payload.description.clone();
            }
        },
    }
    if intent != Intent::Cancel && tx.description.is_none() {
        tx.description = payload.description.clone();
    }
}

async fn upsert_event(ledger: &dyn LedgerStorageTrait, upsert: EventUpsert) -> Result<()> {
    let events = ledger.get_events(&upsert.key).await?;
    let Some(existing) = find_live_event(&events, &upsert.sender, upsert.family) else {
        let mut event = MultisigEvent::new(&upsert.key, &upsert.sender, upsert.status);
        event.extrinsic_hash = upsert.extrinsic_hash;
        event.event_block = Some(upsert.extrinsic_timepoint.height);
        event.event_index = Some(upsert.extrinsic_timepoint.index);
        event.date_created = Some(upsert.date_created);
        event.multisig_outcome = upsert.outcome;
        ledger.create_event(event).await?;
        return Ok(());
    };

    let mut event = existing.clone();
    let incoming = (
        upsert.extrinsic_timepoint.height,
        upsert.extrinsic_timepoint.index,
    );
    let recorded = event.event_block.zip(event.event_index);
    // Keep the latest extrinsic so the result doesn't depend on arrival order.
    if recorded.map_or(true, |recorded| incoming >= recorded) {
        event.event_block = Some(incoming.0);
        event.event_index = Some(incoming.1);
        if upsert.extrinsic_hash.is_some() {
            event.extrinsic_hash = upsert.extrinsic_hash;
        }
    }
    event.date_created.get_or_insert(upsert.date_created);
    event.status = merge_status(event.status, upsert.status);
    if upsert.outcome.is_some() {
        event.multisig_outcome = upsert.outcome;
    }
    if &event != existing {
        ledger.update_event(event).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::{MemoryLedger, NoContacts},
        utils::derive_multisig_account_id,
    };
    use mockall::{mock, Sequence};
    use tokio::sync::Mutex;

    mock! {
        pub Channel {}
        #[async_trait::async_trait]
        impl MessageChannelTrait for Channel {
            async fn join_room(&self, room_id: &str) -> Result<()>;
            async fn leave_room(&self, room_id: &str) -> Result<()>;
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        notifications: Mutex<Vec<Notification>>,
    }

    #[async_trait::async_trait]
    impl NotificationSinkTrait for RecordingSink {
        async fn notify(&self, notification: Notification) -> Result<()> {
            self.notifications.lock().await.push(notification);
            Ok(())
        }
    }

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        sink: Arc<RecordingSink>,
        queue: TaskQueue,
        handler: MultisigMessageHandler,
    }

    fn fixture(channel: MockChannel) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let sink = Arc::new(RecordingSink::default());
        let (queue, _worker) = TaskQueue::start();
        let handler = MultisigMessageHandler::new(
            ledger.clone(),
            ChainRegistry::new(),
            queue.clone(),
            Arc::new(NoContacts),
            sink.clone(),
            Arc::new(channel),
        );
        Fixture {
            ledger,
            sink,
            queue,
            handler,
        }
    }

    fn mst_account(creator: &str) -> MstAccountPayload {
        let signatories = vec!["0x01".to_string(), "0x02".to_string()];
        MstAccountPayload {
            account_id: derive_multisig_account_id(&signatories, 2).unwrap(),
            signatories,
            threshold: 2,
            account_name: "Treasury".to_string(),
            creator_account_id: creator.to_string(),
        }
    }

    fn invite(room_id: &str, sender: &str, mst_account: MstAccountPayload) -> MultisigMessage {
        MultisigMessage {
            room_id: room_id.to_string(),
            sender: sender.to_string(),
            content: MessageContent::Invite(InvitePayload { mst_account }),
        }
    }

    fn approve(sender: &str, extrinsic: Timepoint) -> MultisigMessage {
        MultisigMessage {
            room_id: "!room".to_string(),
            sender: sender.to_string(),
            content: MessageContent::Approve(MultisigPayload {
                mst_account: mst_account("0x01"),
                call_hash: "0xcall".to_string(),
                call_data: None,
                chain_id: "polkadot".to_string(),
                call_timepoint: Timepoint {
                    height: 10,
                    index: 1,
                },
                extrinsic_timepoint: extrinsic,
                extrinsic_hash: Some(format!("0xext{}", extrinsic.height)),
                description: Some("Pay the team".to_string()),
                error: false,
                call_outcome: None,
            }),
        }
    }

    #[tokio::test]
    async fn test_invite_creates_account_and_joins_room() {
        let mut channel = MockChannel::new();
        channel
            .expect_join_room()
            .withf(|room_id: &str| room_id == "!room")
            .times(1)
            .returning(|_| Ok(()));
        let fixture = fixture(channel);

        let message = invite("!room", "0x02", mst_account("0x01"));
        fixture.handler.handle(message.clone()).await.unwrap();
        // A second delivery of the same invite is a no-op.
        fixture.handler.handle(message).await.unwrap();

        let account_id = mst_account("0x01").account_id;
        let account = fixture.ledger.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.matrix_room_id.as_deref(), Some("!room"));
        assert_eq!(account.signatories.len(), 2);
        let notifications = fixture.sink.notifications.lock().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::MultisigInvite);
        assert_eq!(notifications[0].originator_account_id, "0x02");
    }

    // Test Case: An invite whose room join fails stores nothing, so redelivery retries it.
    #[tokio::test]
    async fn test_invite_retries_after_failed_join() {
        let mut channel = MockChannel::new();
        let mut seq = Sequence::new();
        channel
            .expect_join_room()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow::anyhow!("Homeserver unreachable")));
        channel
            .expect_join_room()
            .withf(|room_id: &str| room_id == "!room")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        let fixture = fixture(channel);
        let account_id = mst_account("0x01").account_id;

        let message = invite("!room", "0x02", mst_account("0x01"));
        assert!(fixture.handler.handle(message.clone()).await.is_err());
        assert!(fixture.ledger.get_account(&account_id).await.unwrap().is_none());
        assert!(fixture.sink.notifications.lock().await.is_empty());

        fixture.handler.handle(message).await.unwrap();
        let account = fixture.ledger.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.matrix_room_id.as_deref(), Some("!room"));
        let notifications = fixture.sink.notifications.lock().await;
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::MultisigInvite);
    }

    #[tokio::test]
    async fn test_forged_invite_leaves_room() {
        let mut channel = MockChannel::new();
        channel
            .expect_leave_room()
            .withf(|room_id: &str| room_id == "!forged")
            .times(1)
            .returning(|_| Ok(()));
        channel.expect_join_room().never();
        let fixture = fixture(channel);

        let mut forged = mst_account("0x01");
        forged.threshold = 1;
        fixture
            .handler
            .handle(invite("!forged", "0x01", forged))
            .await
            .unwrap();
        assert!(fixture.ledger.get_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invite_room_migration_prefers_larger_creator() {
        let mut channel = MockChannel::new();
        channel.expect_join_room().returning(|_| Ok(()));
        // The invite from the smaller creator is left, the one from the larger creator wins.
        channel
            .expect_leave_room()
            .withf(|room_id: &str| room_id == "!smaller")
            .times(1)
            .returning(|_| Ok(()));
        let fixture = fixture(channel);

        fixture
            .handler
            .handle(invite("!larger", "0x02", mst_account("0x02")))
            .await
            .unwrap();
        fixture
            .handler
            .handle(invite("!smaller", "0x01", mst_account("0x01")))
            .await
            .unwrap();

        let account_id = mst_account("0x01").account_id;
        let account = fixture.ledger.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.matrix_room_id.as_deref(), Some("!larger"));
        assert_eq!(account.creator_account_id, "0x02");
    }

    #[tokio::test]
    async fn test_invite_room_migration_moves_to_larger_creator() {
        let mut channel = MockChannel::new();
        channel.expect_join_room().times(2).returning(|_| Ok(()));
        channel
            .expect_leave_room()
            .withf(|room_id: &str| room_id == "!smaller")
            .times(1)
            .returning(|_| Ok(()));
        let fixture = fixture(channel);

        fixture
            .handler
            .handle(invite("!smaller", "0x01", mst_account("0x01")))
            .await
            .unwrap();
        fixture
            .handler
            .handle(invite("!larger", "0x02", mst_account("0x02")))
            .await
            .unwrap();

        let account_id = mst_account("0x01").account_id;
        let account = fixture.ledger.get_account(&account_id).await.unwrap().unwrap();
        assert_eq!(account.matrix_room_id.as_deref(), Some("!larger"));
        let notifications = fixture.sink.notifications.lock().await;
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[1].kind, NotificationKind::MultisigRoomMigrated);
    }

    #[tokio::test]
    async fn test_approve_keeps_latest_extrinsic() {
        let mut channel = MockChannel::new();
        channel.expect_join_room().returning(|_| Ok(()));
        let fixture = fixture(channel);
        fixture
            .handler
            .handle(invite("!room", "0x01", mst_account("0x01")))
            .await
            .unwrap();

        let later = Timepoint {
            height: 20,
            index: 0,
        };
        let earlier = Timepoint {
            height: 15,
            index: 4,
        };
        fixture.handler.handle(approve("0x02", later)).await.unwrap();
        fixture.handler.handle(approve("0x02", earlier)).await.unwrap();
        fixture.queue.flush().await;

        let key = match &approve("0x02", later).content {
            MessageContent::Approve(payload) => payload.tx_key(),
            _ => unreachable!(),
        };
        let tx = fixture.ledger.get_transaction(&key).await.unwrap().unwrap();
        assert_eq!(tx.status, MultisigTxStatus::Signing);
        assert_eq!(tx.description.as_deref(), Some("Pay the team"));
        let events = fixture.ledger.get_events(&key).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, MultisigEventStatus::Signed);
        assert_eq!(events[0].event_block, Some(20));
        assert_eq!(events[0].extrinsic_hash.as_deref(), Some("0xext20"));
    }

    #[tokio::test]
    async fn test_approve_for_unknown_account_is_ignored() {
        let fixture = fixture(MockChannel::new());
        fixture
            .handler
            .handle(approve(
                "0x02",
                Timepoint {
                    height: 11,
                    index: 0,
                },
            ))
            .await
            .unwrap();
        fixture.queue.flush().await;
        assert!(fixture
            .ledger
            .get_transactions(&Default::default())
            .await
            .unwrap()
            .is_empty());
    }
}
