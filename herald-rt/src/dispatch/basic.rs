//! Single-queue dispatcher.
//!
//! Runs every accepted task on the tokio pool, one spawned task per turn.
//! Turn bodies themselves serialize per actor (the mailbox holds the turn
//! token), so the pool parallelism only ever runs distinct actors
//! concurrently. When the in-flight count reaches the configured threshold,
//! new tasks are deferred to an overflow queue drained as slots free.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::debug;

// Layer 3: Internal module imports
use super::traits::{DispatchError, DispatchTask, Dispatcher, TaskFuture};

/// Default in-flight task threshold before deferral kicks in.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1024;

/// Configuration for the basic dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasicDispatcherConfig {
    /// In-flight tasks allowed before new tasks are deferred
    pub max_in_flight: usize,
}

impl Default for BasicDispatcherConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Basic dispatcher: immediate spawn up to a threshold, FIFO deferral past
/// it. Task class and priority are ignored; the layered dispatcher honors
/// them.
pub struct BasicDispatcher {
    inner: Arc<BasicInner>,
}

struct BasicInner {
    max_in_flight: usize,
    in_flight: AtomicUsize,
    deferred: Mutex<VecDeque<TaskFuture>>,
    shutting_down: AtomicBool,
}

impl BasicDispatcher {
    /// Create a dispatcher with the given configuration.
    pub fn new(config: BasicDispatcherConfig) -> Self {
        Self {
            inner: Arc::new(BasicInner {
                max_in_flight: config.max_in_flight.max(1),
                in_flight: AtomicUsize::new(0),
                deferred: Mutex::new(VecDeque::new()),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    /// Number of tasks currently running.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Number of tasks deferred past the threshold.
    pub fn deferred_len(&self) -> usize {
        self.inner.deferred.lock().len()
    }

    fn spawn_task(inner: Arc<BasicInner>, future: TaskFuture) {
        tokio::spawn(async move {
            future.await;
            // Keep the slot if deferred work is waiting; otherwise free it.
            loop {
                let next = inner.deferred.lock().pop_front();
                match next {
                    Some(next) => {
                        next.await;
                    }
                    None => {
                        inner.in_flight.fetch_sub(1, Ordering::AcqRel);
                        break;
                    }
                }
            }
        });
    }
}

impl Default for BasicDispatcher {
    fn default() -> Self {
        Self::new(BasicDispatcherConfig::default())
    }
}

#[async_trait]
impl Dispatcher for BasicDispatcher {
    fn schedule(&self, task: DispatchTask) -> Result<(), DispatchError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(DispatchError::ShuttingDown);
        }

        let claimed = self
            .inner
            .in_flight
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.inner.max_in_flight).then_some(current + 1)
            })
            .is_ok();

        if claimed {
            Self::spawn_task(Arc::clone(&self.inner), task.future);
        } else {
            debug!("basic dispatcher at threshold, deferring task");
            self.inner.deferred.lock().push_back(task.future);
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::Release);

        loop {
            let busy = self.inner.in_flight.load(Ordering::Acquire) > 0
                || !self.inner.deferred.lock().is_empty();
            if !busy {
                break;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }
}
