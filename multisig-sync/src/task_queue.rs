// Copyright © Aptos Foundation
// SPDX-License-Identifier: Apache-2.0

use crate::{
    counters::{TASK_QUEUE_DEPTH, TASK_QUEUE_FAILED_TASKS_COUNT},
    SYNC_SERVICE_TYPE,
};
use anyhow::Result;
use futures::{future::BoxFuture, FutureExt};
use std::{future::Future, panic::AssertUnwindSafe};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error};

enum QueueItem {
    Task {
        name: &'static str,
        task: BoxFuture<'static, Result<()>>,
    },
    Flush(oneshot::Sender<()>),
}

/// Serial executor for ledger event mutations. Tasks run one at a time in submission
/// order on a single worker, so a task's reads always observe the writes of every task
/// queued before it.
#[derive(Clone, Debug)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<QueueItem>,
}

impl std::fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueItem::Task { name, .. } => write!(f, "Task({})", name),
            QueueItem::Flush(_) => write!(f, "Flush"),
        }
    }
}

impl TaskQueue {
    /// Spawns the worker. It exits once every handle to the queue is dropped.
    pub fn start() -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let join_handle = tokio::spawn(run_worker(receiver));
        (Self { sender }, join_handle)
    }

    /// Queues `task` without waiting for it. The future is only polled when its turn
    /// comes, so any reads it performs happen at execution time.
    pub fn enqueue<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        TASK_QUEUE_DEPTH.inc();
        let item = QueueItem::Task {
            name,
            task: task.boxed(),
        };
        if self.sender.send(item).is_err() {
            TASK_QUEUE_DEPTH.dec();
            error!(
                service_type = SYNC_SERVICE_TYPE,
                task = name,
                "[MultisigSync] Task queue worker has stopped, dropping task"
            );
        }
    }

    /// Resolves once every task queued before this call has finished.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(QueueItem::Flush(done_tx)).is_err() {
            return;
        }
        let _ = done_rx.await;
    }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<QueueItem>) {
    while let Some(item) = receiver.recv().await {
        match item {
            QueueItem::Task { name, task } => {
                let result = AssertUnwindSafe(task).catch_unwind().await;
                TASK_QUEUE_DEPTH.dec();
                match result {
                    Ok(Ok(())) => {
                        debug!(
                            service_type = SYNC_SERVICE_TYPE,
                            task = name,
                            "[MultisigSync] Task finished"
                        );
                    },
                    Ok(Err(e)) => {
                        TASK_QUEUE_FAILED_TASKS_COUNT.with_label_values(&[name]).inc();
                        error!(
                            service_type = SYNC_SERVICE_TYPE,
                            task = name,
                            error = ?e,
                            "[MultisigSync] Task failed"
                        );
                    },
                    Err(_) => {
                        TASK_QUEUE_FAILED_TASKS_COUNT.with_label_values(&[name]).inc();
                        error!(
                            service_type = SYNC_SERVICE_TYPE,
                            task = name,
                            "[MultisigSync] Task panicked"
                        );
                    },
                }
            },
            QueueItem::Flush(done) => {
                let _ = done.send(());
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};
    use tokio::sync::Mutex;

    #[tokio::test]
    async fn test_tasks_run_in_submission_order() {
        let (queue, _handle) = TaskQueue::start();
        let log = Arc::new(Mutex::new(vec![]));
        for i in 0..10u64 {
            let log = log.clone();
            queue.enqueue("ordered", async move {
                // Later tasks sleep less; order must still hold.
                tokio::time::sleep(Duration::from_millis(10 - i)).await;
                log.lock().await.push(i);
                Ok(())
            });
        }
        queue.flush().await;
        assert_eq!(*log.lock().await, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_tasks_never_overlap() {
        let (queue, _handle) = TaskQueue::start();
        let counter = Arc::new(Mutex::new(0u64));
        for _ in 0..20 {
            let counter = counter.clone();
            queue.enqueue("read_modify_write", async move {
                let current = *counter.lock().await;
                tokio::time::sleep(Duration::from_millis(1)).await;
                *counter.lock().await = current + 1;
                Ok(())
            });
        }
        queue.flush().await;
        assert_eq!(*counter.lock().await, 20);
    }

    fn ran_before_panic() -> bool {
        true
    }

    #[tokio::test]
    async fn test_failed_and_panicking_tasks_do_not_stop_the_queue() {
        let (queue, _handle) = TaskQueue::start();
        let ran = Arc::new(Mutex::new(false));
        queue.enqueue("fails", async { Err(anyhow::anyhow!("boom")) });
        queue.enqueue("panics", async {
            if ran_before_panic() {
                panic!("boom");
            }
            Ok(())
        });
        let ran_clone = ran.clone();
        queue.enqueue("runs", async move {
            *ran_clone.lock().await = true;
            Ok(())
        });
        queue.flush().await;
        assert!(*ran.lock().await);
    }
}
