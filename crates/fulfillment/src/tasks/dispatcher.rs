//! Channel-backed task queue and its worker pool.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::{EnqueueError, Task, TaskHandler, TaskQueue};

/// Sending half of the task channel.
#[derive(Debug, Clone)]
pub struct TaskDispatcher {
    tx: mpsc::UnboundedSender<Task>,
}

impl TaskQueue for TaskDispatcher {
    fn enqueue(&self, task: Task) -> Result<(), EnqueueError> {
        self.tx.send(task).map_err(|_| EnqueueError::Closed)
    }
}

/// Worker tasks draining the channel.
#[derive(Debug)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    /// Waits until every queued task has run.
    ///
    /// Workers exit once all [`TaskDispatcher`] clones are dropped and the
    /// channel is empty.
    pub async fn shutdown(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "task worker panicked");
            }
        }
        tracing::info!("task workers stopped");
    }
}

/// Starts `workers` tasks (at least one) feeding `handler`.
pub fn spawn_workers<H: TaskHandler>(handler: Arc<H>, workers: usize) -> (TaskDispatcher, WorkerPool) {
    let (tx, rx) = mpsc::unbounded_channel::<Task>();
    let rx = Arc::new(Mutex::new(rx));

    let handles = (0..workers.max(1))
        .map(|worker| {
            let rx = Arc::clone(&rx);
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                loop {
                    let next = rx.lock().await.recv().await;
                    let Some(task) = next else {
                        break;
                    };
                    tracing::debug!(worker, task = task.name(), order_id = %task.order_id(), "task dequeued");
                    handler.handle(task).await;
                }
            })
        })
        .collect();

    tracing::info!(workers = workers.max(1), "task workers started");
    (TaskDispatcher { tx }, WorkerPool { handles })
}

/// Queue that records tasks instead of running them.
#[derive(Debug, Clone, Default)]
pub struct RecordingTaskQueue {
    tasks: Arc<StdMutex<Vec<Task>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent enqueue fail.
    pub fn set_closed(&self, closed: bool) {
        self.closed.store(closed, Ordering::SeqCst);
    }

    /// Tasks enqueued so far, oldest first.
    pub fn tasks(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded tasks equal to `task`.
    pub fn count(&self, task: Task) -> usize {
        self.tasks().iter().filter(|t| **t == task).count()
    }

    pub fn clear(&self) {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TaskQueue for RecordingTaskQueue {
    fn enqueue(&self, task: Task) -> Result<(), EnqueueError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(EnqueueError::Closed);
        }
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(())
    }
}
