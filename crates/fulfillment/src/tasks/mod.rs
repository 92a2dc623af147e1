//! Deferred tasks.
//!
//! Services only depend on [`TaskQueue::enqueue`], which returns as soon as
//! the task is queued. A [`WorkerPool`] drains the queue and hands each task
//! to a [`TaskHandler`], normally a [`TaskExecutor`] with its own retry
//! policies.

pub mod dispatcher;
pub mod executor;
pub mod receipt;
pub mod retry;
pub mod shipment;

pub use dispatcher::{RecordingTaskQueue, TaskDispatcher, WorkerPool, spawn_workers};
pub use executor::{FailedTask, FailedTasks, TaskExecutor};
pub use receipt::{DocumentStore, FsDocumentStore, InMemoryDocumentStore, receipt_path};
pub use retry::{Backoff, RetryPolicy, run_with_retry};
pub use shipment::{
    HttpShipmentNotifier, InMemoryShipmentNotifier, ShipmentNotice, ShipmentNotifier,
};

use async_trait::async_trait;
use common::OrderId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Work scheduled by a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum Task {
    /// Render and store the receipt of a new order.
    GenerateReceipt { order_id: OrderId },
    /// Tell the shipping partner an order has shipped.
    NotifyShipment { order_id: OrderId },
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::GenerateReceipt { .. } => "generate_receipt",
            Task::NotifyShipment { .. } => "notify_shipment",
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            Task::GenerateReceipt { order_id } | Task::NotifyShipment { order_id } => *order_id,
        }
    }
}

/// A failed task attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Worth retrying: timeouts, unavailable dependencies.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Retrying cannot help.
    #[error("Permanent failure: {0}")]
    Permanent(String),
}

impl TaskError {
    pub fn is_transient(&self) -> bool {
        matches!(self, TaskError::Transient(_))
    }
}

/// The task queue rejected a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnqueueError {
    /// No worker will ever receive the task.
    #[error("Task queue is closed")]
    Closed,
}

/// Accepts tasks without waiting for them to run.
pub trait TaskQueue: Send + Sync {
    fn enqueue(&self, task: Task) -> Result<(), EnqueueError>;
}

/// Runs one dequeued task to completion, retries included.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, task: Task);
}

/// Enqueues after a commit. A rejected task is logged; the mutation it
/// belongs to has already succeeded.
pub(crate) fn enqueue_after_commit(queue: &dyn TaskQueue, task: Task) {
    match queue.enqueue(task) {
        Ok(()) => {
            tracing::debug!(task = task.name(), order_id = %task.order_id(), "task enqueued");
        }
        Err(e) => {
            metrics::counter!("tasks_enqueue_failures_total", "task" => task.name()).increment(1);
            tracing::error!(task = task.name(), order_id = %task.order_id(), error = %e, "failed to enqueue task");
        }
    }
}
