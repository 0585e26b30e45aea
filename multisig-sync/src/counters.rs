// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge, register_int_gauge_vec, IntCounterVec, IntGauge,
    IntGaugeVec,
};

/// Number of messages received from the message channel, by message type
pub static MESSAGES_RECEIVED_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "multisig_sync_messages_received_count",
        "Number of messages received from the message channel",
        &["message_type"]
    )
    .unwrap()
});

/// Number of messages dropped because they failed validation
pub static MESSAGES_REJECTED_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "multisig_sync_messages_rejected_count",
        "Number of messages dropped because they failed validation",
        &["message_type", "reason"]
    )
    .unwrap()
});

/// Number of reconciliation iterations, by result
pub static RECONCILIATION_ITERATIONS_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "multisig_sync_reconciliation_iterations_count",
        "Number of reconciliation iterations",
        &["chain_id", "result"]
    )
    .unwrap()
});

/// Number of pending on-chain calls seen in the latest iteration of an account
pub static PENDING_CALLS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "multisig_sync_pending_calls",
        "Number of pending on-chain calls seen in the latest iteration",
        &["chain_id", "account_id"]
    )
    .unwrap()
});

/// Number of tasks waiting in or running on the task queue
pub static TASK_QUEUE_DEPTH: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "multisig_sync_task_queue_depth",
        "Number of tasks waiting in or running on the task queue"
    )
    .unwrap()
});

/// Number of queued tasks that returned an error or panicked
pub static TASK_QUEUE_FAILED_TASKS_COUNT: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "multisig_sync_task_queue_failed_tasks_count",
        "Number of queued tasks that returned an error or panicked",
        &["task"]
    )
    .unwrap()
});
