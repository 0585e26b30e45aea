// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

mod handler;
pub mod payload;
pub mod validation;

pub use handler::MultisigMessageHandler;
pub use payload::{InvitePayload, MessageContent, MstAccountPayload, MultisigMessage, MultisigPayload};
pub use validation::ValidationError;

use crate::SYNC_SERVICE_TYPE;
use anyhow::Result;
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Room membership operations of the off-chain channel.
#[async_trait::async_trait]
pub trait MessageChannelTrait: 'static + Send + Sync {
    async fn join_room(&self, room_id: &str) -> Result<()>;

    async fn leave_room(&self, room_id: &str) -> Result<()>;
}

/// Everything the channel transport delivers to a session.
#[derive(Clone, Debug)]
pub enum ChannelEvent {
    Message(MultisigMessage),
    /// The transport finished replaying history.
    SyncEnd,
    Logout,
}

/// A login session consuming channel events on a spawned task.
#[derive(Debug)]
pub struct MessageChannelSession {
    cancel_token: CancellationToken,
    join_handle: JoinHandle<()>,
}

impl MessageChannelSession {
    pub fn start(
        handler: Arc<MultisigMessageHandler>,
        receiver: mpsc::Receiver<ChannelEvent>,
    ) -> Self {
        let cancel_token = CancellationToken::new();
        let join_handle = tokio::spawn(run_session(handler, receiver, cancel_token.clone()));
        Self {
            cancel_token,
            join_handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }

    /// Stops consuming after the message in flight and waits for the task to exit.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        let _ = self.join_handle.await;
    }

    /// Waits for the session to end on its own, e.g. after a logout.
    pub async fn join(self) {
        let _ = self.join_handle.await;
    }
}

async fn run_session(
    handler: Arc<MultisigMessageHandler>,
    mut receiver: mpsc::Receiver<ChannelEvent>,
    cancel_token: CancellationToken,
) {
    info!(
        service_type = SYNC_SERVICE_TYPE,
        "[MultisigSync] Message channel session started"
    );
    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => break,
            event = receiver.recv() => event,
        };
        match event {
            Some(ChannelEvent::Message(message)) => {
                let message_type = message.content.message_type();
                if let Err(e) = handler.handle(message).await {
                    warn!(
                        service_type = SYNC_SERVICE_TYPE,
                        message_type = message_type,
                        error = ?e,
                        "[MultisigSync] Failed to handle channel message"
                    );
                }
            },
            Some(ChannelEvent::SyncEnd) => {
                info!(
                    service_type = SYNC_SERVICE_TYPE,
                    "[MultisigSync] Message channel finished initial sync"
                );
            },
            Some(ChannelEvent::Logout) => {
                handler.logout().await;
                break;
            },
            None => break,
        }
    }
    info!(
        service_type = SYNC_SERVICE_TYPE,
        "[MultisigSync] Message channel session stopped"
    );
}
