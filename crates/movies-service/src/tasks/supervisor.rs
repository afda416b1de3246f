//! Background task supervisor.
//!
//! Runs fire-and-forget side effects (activation mail, for example) outside
//! the request that triggered them:
//!
//! - Each submitted task runs on its own tokio task, so dropping or aborting
//!   the submitting request does not cancel it.
//! - Errors and panics stop at the task boundary. They are logged and counted
//!   and never reach the request or the process.
//! - Every task is tracked. [`TaskSupervisor::quiesce`] blocks until all of
//!   them finish or a deadline passes.

use crate::observability::metrics::{record_background_task, set_background_tasks_in_flight};
use std::any::Any;
use std::future::Future;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

/// Result of a quiesce attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuiesceOutcome {
    /// Every submitted task finished.
    Drained,
    /// The deadline elapsed with tasks still running.
    TimedOut { remaining: usize },
}

#[derive(Debug, Clone, Default)]
pub struct TaskSupervisor {
    tracker: TaskTracker,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Number of submitted tasks that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Schedule `task` to run independently of the caller.
    pub fn submit<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.tracker.is_closed() {
            warn!(
                target: "movies.tasks",
                task = name,
                "Task submitted while quiescing, it will still be awaited"
            );
        }

        // The inner spawn turns a panic into a JoinError instead of unwinding
        // through the tracked wrapper.
        let inner = tokio::spawn(task);
        let tracker = self.tracker.clone();

        self.tracker.spawn(async move {
            let outcome = match inner.await {
                Ok(Ok(())) => "success",
                Ok(Err(e)) => {
                    error!(
                        target: "movies.tasks",
                        task = name,
                        error = %e,
                        "Background task failed"
                    );
                    "error"
                }
                Err(join_error) if join_error.is_panic() => {
                    error!(
                        target: "movies.tasks",
                        task = name,
                        panic = %panic_message(join_error.into_panic()),
                        "Background task panicked"
                    );
                    "panic"
                }
                Err(_) => {
                    warn!(target: "movies.tasks", task = name, "Background task cancelled");
                    "cancelled"
                }
            };

            record_background_task(name, outcome);
            // This wrapper is still counted until it returns.
            set_background_tasks_in_flight(tracker.len().saturating_sub(1));
        });

        set_background_tasks_in_flight(self.tracker.len());
    }

    /// Stop accepting work and wait for every submitted task, bounded by
    /// `deadline`.
    pub async fn quiesce(&self, deadline: Duration) -> QuiesceOutcome {
        self.tracker.close();

        info!(
            target: "movies.tasks",
            in_flight = self.tracker.len(),
            deadline_ms = deadline.as_millis() as u64,
            "Waiting for background tasks to finish"
        );

        match tokio::time::timeout(deadline, self.tracker.wait()).await {
            Ok(()) => {
                info!(target: "movies.tasks", "All background tasks finished");
                QuiesceOutcome::Drained
            }
            Err(_) => {
                let remaining = self.tracker.len();
                warn!(
                    target: "movies.tasks",
                    remaining = remaining,
                    "Shutdown deadline elapsed with background tasks still running"
                );
                QuiesceOutcome::TimedOut { remaining }
            }
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
