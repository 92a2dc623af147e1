//! Runs tasks with their retry policies and records the ones that give up.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use store::Store;
use uuid::Uuid;

use super::receipt::{DocumentStore, generate_receipt};
use super::retry::{RetryPolicy, run_with_retry};
use super::shipment::ShipmentNotifier;
use super::{Task, TaskError, TaskHandler};

/// A task that exhausted its retries or failed permanently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedTask {
    pub id: Uuid,
    pub task: Task,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

/// Dead-letter list of failed tasks, kept for operators.
#[derive(Debug, Clone, Default)]
pub struct FailedTasks {
    entries: Arc<Mutex<Vec<FailedTask>>>,
}

impl FailedTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, task: Task, error: &TaskError, attempts: u32) -> FailedTask {
        let entry = FailedTask {
            id: Uuid::new_v4(),
            task,
            error: error.to_string(),
            attempts,
            failed_at: Utc::now(),
        };
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        entry
    }

    /// Oldest first.
    pub fn list(&self) -> Vec<FailedTask> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Executes receipt and shipment tasks.
pub struct TaskExecutor<S: Store> {
    store: S,
    documents: Arc<dyn DocumentStore>,
    notifier: Arc<dyn ShipmentNotifier>,
    receipt_policy: RetryPolicy,
    shipment_policy: RetryPolicy,
    failed: FailedTasks,
}

impl<S: Store> TaskExecutor<S> {
    pub fn new(
        store: S,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn ShipmentNotifier>,
        failed: FailedTasks,
    ) -> Self {
        Self {
            store,
            documents,
            notifier,
            receipt_policy: RetryPolicy::receipt(),
            shipment_policy: RetryPolicy::shipment(),
            failed,
        }
    }

    pub fn with_receipt_policy(mut self, policy: RetryPolicy) -> Self {
        self.receipt_policy = policy;
        self
    }

    pub fn with_shipment_policy(mut self, policy: RetryPolicy) -> Self {
        self.shipment_policy = policy;
        self
    }

    pub fn failed(&self) -> &FailedTasks {
        &self.failed
    }

    /// Runs one task. Returns false if it ended up in the dead-letter list.
    #[tracing::instrument(skip(self), fields(task = task.name(), order_id = %task.order_id()))]
    pub async fn execute(&self, task: Task) -> bool {
        let result = match task {
            Task::GenerateReceipt { order_id } => {
                run_with_retry(&self.receipt_policy, task.name(), || {
                    generate_receipt(&self.store, self.documents.as_ref(), order_id)
                })
                .await
                .map(drop)
            }
            Task::NotifyShipment { order_id } => {
                run_with_retry(&self.shipment_policy, task.name(), || {
                    self.notifier.notify(order_id)
                })
                .await
            }
        };

        match result {
            Ok(()) => {
                metrics::counter!("tasks_executed_total", "task" => task.name(), "outcome" => "succeeded")
                    .increment(1);
                true
            }
            Err((error, attempts)) => {
                metrics::counter!("tasks_executed_total", "task" => task.name(), "outcome" => "failed")
                    .increment(1);
                let entry = self.failed.record(task, &error, attempts);
                tracing::error!(
                    failed_task_id = %entry.id,
                    attempts,
                    error = %error,
                    "task failed, moved to dead-letter list"
                );
                false
            }
        }
    }
}

#[async_trait]
impl<S: Store> TaskHandler for TaskExecutor<S> {
    async fn handle(&self, task: Task) {
        self.execute(task).await;
    }
}
