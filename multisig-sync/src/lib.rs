// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

pub mod chain;
pub mod config;
pub mod counters;
pub mod event_merger;
pub mod logging;
pub mod message_channel;
pub mod models;
pub mod notification;
pub mod reconciler;
pub mod storage;
pub mod task_queue;
pub mod utils;

/// Used for logging purposes to identify the source of the logging.
pub const SYNC_SERVICE_TYPE: &str = "multisig_sync";
