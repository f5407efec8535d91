//! Class-partitioned dispatcher with priority lanes and adaptive caps.
//!
//! Tasks are partitioned into workload classes; each class owns a queue with
//! three priority lanes and an independent concurrency cap. Within a class
//! the High lane is fully drained before Normal, and Normal before Low. The
//! adaptive variant nudges per-class caps between configured bounds based on
//! observed queue depth and utilization.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::debug;

// Layer 3: Internal module imports
use super::traits::{DispatchError, DispatchTask, Dispatcher, TaskClass, TaskFuture};
use crate::util::serde_helpers::duration_serde;

/// Per-class queue and concurrency limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassConfig {
    /// Concurrent tasks allowed in this class
    pub concurrency: usize,

    /// Queued tasks allowed before `schedule` rejects
    pub max_queued: usize,
}

impl Default for ClassConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            max_queued: 10_000,
        }
    }
}

/// Configuration for the layered dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayeredDispatcherConfig {
    /// Compute-heavy class
    pub cpu_intensive: ClassConfig,

    /// I/O-dominated class
    pub io_intensive: ClassConfig,

    /// Latency-sensitive class
    pub low_latency: ClassConfig,

    /// Bulk class
    pub batch: ClassConfig,

    /// Default class
    pub default_class: ClassConfig,

    /// Enable the adaptive concurrency tuner
    pub adaptive: bool,

    /// Lower bound for adaptive caps
    pub min_concurrency: usize,

    /// Upper bound for adaptive caps
    pub max_concurrency: usize,

    /// Interval between tuner passes (also the metrics-collection interval)
    #[serde(with = "duration_serde")]
    pub tune_interval: Duration,

    /// Log tuner decisions
    pub debug: bool,
}

impl Default for LayeredDispatcherConfig {
    fn default() -> Self {
        Self {
            cpu_intensive: ClassConfig {
                concurrency: 4,
                max_queued: 10_000,
            },
            io_intensive: ClassConfig {
                concurrency: 16,
                max_queued: 10_000,
            },
            low_latency: ClassConfig {
                concurrency: 8,
                max_queued: 10_000,
            },
            batch: ClassConfig {
                concurrency: 2,
                max_queued: 10_000,
            },
            default_class: ClassConfig::default(),
            adaptive: false,
            min_concurrency: 1,
            max_concurrency: 64,
            tune_interval: Duration::from_millis(500),
            debug: false,
        }
    }
}

impl LayeredDispatcherConfig {
    fn class_config(&self, class: TaskClass) -> ClassConfig {
        match class {
            TaskClass::CpuIntensive => self.cpu_intensive,
            TaskClass::IoIntensive => self.io_intensive,
            TaskClass::LowLatency => self.low_latency,
            TaskClass::Batch => self.batch,
            TaskClass::Default => self.default_class,
        }
    }
}

const ALL_CLASSES: [TaskClass; 5] = [
    TaskClass::CpuIntensive,
    TaskClass::IoIntensive,
    TaskClass::LowLatency,
    TaskClass::Batch,
    TaskClass::Default,
];

fn class_index(class: TaskClass) -> usize {
    match class {
        TaskClass::CpuIntensive => 0,
        TaskClass::IoIntensive => 1,
        TaskClass::LowLatency => 2,
        TaskClass::Batch => 3,
        TaskClass::Default => 4,
    }
}

struct ClassState {
    class: TaskClass,
    lanes: [Mutex<VecDeque<TaskFuture>>; 3],
    queued: AtomicUsize,
    running: AtomicUsize,
    cap: AtomicUsize,
    max_queued: usize,
    completed: AtomicU64,
    notify: Notify,
}

impl ClassState {
    fn new(class: TaskClass, config: ClassConfig) -> Self {
        Self {
            class,
            lanes: std::array::from_fn(|_| Mutex::new(VecDeque::new())),
            queued: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            cap: AtomicUsize::new(config.concurrency.max(1)),
            max_queued: config.max_queued.max(1),
            completed: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }

    /// Strict lane order: High drained before Normal, Normal before Low.
    fn pop_next(&self) -> Option<TaskFuture> {
        for lane in &self.lanes {
            if let Some(task) = lane.lock().pop_front() {
                return Some(task);
            }
        }
        None
    }
}

/// Layered dispatcher with per-class queues, priority lanes, and optional
/// adaptive concurrency.
pub struct LayeredDispatcher {
    inner: Arc<LayeredInner>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

struct LayeredInner {
    classes: [Arc<ClassState>; 5],
    shutting_down: AtomicBool,
    min_concurrency: usize,
    max_concurrency: usize,
    debug: bool,
}

impl LayeredDispatcher {
    /// Create the dispatcher and start one pump task per class (plus the
    /// tuner when adaptive mode is on).
    pub fn new(config: LayeredDispatcherConfig) -> Self {
        let classes: [Arc<ClassState>; 5] = std::array::from_fn(|i| {
            let class = ALL_CLASSES[i];
            Arc::new(ClassState::new(class, config.class_config(class)))
        });

        let inner = Arc::new(LayeredInner {
            classes,
            shutting_down: AtomicBool::new(false),
            min_concurrency: config.min_concurrency.max(1),
            max_concurrency: config.max_concurrency.max(1),
            debug: config.debug,
        });

        let mut handles = Vec::new();
        for state in &inner.classes {
            let state = Arc::clone(state);
            let flag = Arc::clone(&inner);
            handles.push(tokio::spawn(async move {
                Self::pump(state, flag).await;
            }));
        }

        if config.adaptive {
            let tuner_inner = Arc::clone(&inner);
            let interval = config.tune_interval;
            handles.push(tokio::spawn(async move {
                Self::tune(tuner_inner, interval).await;
            }));
        }

        Self {
            inner,
            handles: Mutex::new(handles),
        }
    }

    fn class_state(&self, class: TaskClass) -> &Arc<ClassState> {
        &self.inner.classes[class_index(class)]
    }

    /// Queued tasks in a class (all lanes).
    pub fn queued_len(&self, class: TaskClass) -> usize {
        self.class_state(class).queued.load(Ordering::Acquire)
    }

    /// Currently running tasks in a class.
    pub fn running(&self, class: TaskClass) -> usize {
        self.class_state(class).running.load(Ordering::Acquire)
    }

    /// Current concurrency cap for a class.
    pub fn concurrency_cap(&self, class: TaskClass) -> usize {
        self.class_state(class).cap.load(Ordering::Acquire)
    }

    /// Completed task count for a class.
    pub fn completed(&self, class: TaskClass) -> u64 {
        self.class_state(class).completed.load(Ordering::Acquire)
    }

    async fn pump(state: Arc<ClassState>, inner: Arc<LayeredInner>) {
        loop {
            // Launch while the cap allows and work is queued.
            loop {
                if state.running.load(Ordering::Acquire) >= state.cap.load(Ordering::Acquire) {
                    break;
                }
                let Some(task) = state.pop_next() else {
                    break;
                };
                state.queued.fetch_sub(1, Ordering::AcqRel);
                state.running.fetch_add(1, Ordering::AcqRel);

                let task_state = Arc::clone(&state);
                tokio::spawn(async move {
                    task.await;
                    task_state.running.fetch_sub(1, Ordering::AcqRel);
                    task_state.completed.fetch_add(1, Ordering::AcqRel);
                    task_state.notify.notify_one();
                });
            }

            let draining = inner.shutting_down.load(Ordering::Acquire);
            if draining
                && state.queued.load(Ordering::Acquire) == 0
                && state.running.load(Ordering::Acquire) == 0
            {
                break;
            }

            // Bounded wait so shutdown and cap changes are picked up even
            // without a notification.
            let _ = timeout(Duration::from_millis(50), state.notify.notified()).await;
        }
    }

    async fn tune(inner: Arc<LayeredInner>, interval: Duration) {
        loop {
            if inner.shutting_down.load(Ordering::Acquire) {
                break;
            }
            sleep(interval).await;

            for state in &inner.classes {
                let queued = state.queued.load(Ordering::Acquire);
                let running = state.running.load(Ordering::Acquire);
                let cap = state.cap.load(Ordering::Acquire);

                if queued > cap && cap < inner.max_concurrency {
                    state.cap.store(cap + 1, Ordering::Release);
                    if inner.debug {
                        debug!(class = %state.class, cap = cap + 1, "raised concurrency cap");
                    }
                    state.notify.notify_one();
                } else if queued == 0 && running <= cap / 2 && cap > inner.min_concurrency {
                    state.cap.store(cap - 1, Ordering::Release);
                    if inner.debug {
                        debug!(class = %state.class, cap = cap - 1, "lowered concurrency cap");
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Dispatcher for LayeredDispatcher {
    fn schedule(&self, task: DispatchTask) -> Result<(), DispatchError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(DispatchError::ShuttingDown);
        }

        let state = self.class_state(task.class);
        if state.queued.load(Ordering::Acquire) >= state.max_queued {
            return Err(DispatchError::QueueFull { class: task.class });
        }

        state.lanes[task.priority.lane()].lock().push_back(task.future);
        state.queued.fetch_add(1, Ordering::AcqRel);
        state.notify.notify_one();
        Ok(())
    }

    async fn shutdown(&self) {
        self.inner.shutting_down.store(true, Ordering::Release);
        for state in &self.inner.classes {
            state.notify.notify_one();
        }

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }
    }
}
