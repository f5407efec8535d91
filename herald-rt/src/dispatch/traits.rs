//! Dispatcher contract and task classification.

// Layer 1: Standard library imports
use std::fmt;

// Layer 2: Third-party crate imports
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Layer 3: Internal module imports
use crate::message::MessagePriority;

/// A unit of work submitted to a dispatcher (one processing turn).
pub type TaskFuture = BoxFuture<'static, ()>;

/// Workload class a task belongs to.
///
/// The layered dispatcher keeps an independent queue and concurrency cap per
/// class so that, for instance, long batch turns cannot starve low-latency
/// request handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskClass {
    /// Compute-heavy turns
    CpuIntensive,

    /// Turns dominated by awaited I/O
    IoIntensive,

    /// Latency-sensitive turns; drained ahead of everything else
    LowLatency,

    /// Deferrable bulk work
    Batch,

    /// Everything else
    #[default]
    Default,
}

impl fmt::Display for TaskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CpuIntensive => write!(f, "cpu_intensive"),
            Self::IoIntensive => write!(f, "io_intensive"),
            Self::LowLatency => write!(f, "low_latency"),
            Self::Batch => write!(f, "batch"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Priority lane within a task class.
///
/// Within a class, High is fully drained before Normal, and Normal before
/// Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskPriority {
    /// Head-of-class lane
    High,

    /// Standard lane
    #[default]
    Normal,

    /// Tail lane, served only when the others are empty
    Low,
}

impl TaskPriority {
    /// Lane index used by queue arrays (High first).
    pub(crate) fn lane(self) -> usize {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// A scheduled task: a turn body plus its routing metadata.
pub struct DispatchTask {
    /// Workload class
    pub class: TaskClass,

    /// Priority lane within the class
    pub priority: TaskPriority,

    /// The turn body
    pub future: TaskFuture,
}

impl DispatchTask {
    /// Create a task in the default class and lane.
    pub fn new(future: TaskFuture) -> Self {
        Self {
            class: TaskClass::Default,
            priority: TaskPriority::Normal,
            future,
        }
    }

    /// Builder method: set the task class.
    pub fn with_class(mut self, class: TaskClass) -> Self {
        self.class = class;
        self
    }

    /// Builder method: set the priority lane.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }
}

impl fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTask")
            .field("class", &self.class)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Errors surfaced by `schedule`.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The dispatcher no longer accepts tasks
    #[error("dispatcher shutting down")]
    ShuttingDown,

    /// The class queue is at its configured cap
    #[error("dispatch queue full for class {class}")]
    QueueFull {
        /// The saturated class
        class: TaskClass,
    },
}

/// Common dispatcher contract.
///
/// `schedule` is synchronous and non-blocking: it either accepts the task
/// (running it now or deferring it) or reports why it cannot. `shutdown`
/// stops accepting tasks and resolves once in-flight and already-accepted
/// tasks have completed.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Submit a task for execution.
    fn schedule(&self, task: DispatchTask) -> Result<(), DispatchError>;

    /// Signal no new tasks and wait for accepted work to finish.
    async fn shutdown(&self);
}

/// Heuristic classifier from message priority to task routing.
///
/// High-priority traffic lands in the low-latency class; low-priority
/// traffic is batched; the rest takes the default class.
pub fn classify(priority: MessagePriority) -> (TaskClass, TaskPriority) {
    match priority {
        MessagePriority::Critical | MessagePriority::High => {
            (TaskClass::LowLatency, TaskPriority::High)
        }
        MessagePriority::Low => (TaskClass::Batch, TaskPriority::Low),
        MessagePriority::Normal => (TaskClass::Default, TaskPriority::Normal),
    }
}
