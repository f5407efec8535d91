//! System configuration with sensible defaults.

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::dispatch::{BasicDispatcherConfig, LayeredDispatcherConfig};
use crate::mailbox::BackpressureConfig;
use crate::util::serde_helpers::duration_serde;

/// Default per-turn message budget.
pub const DEFAULT_THROUGHPUT: usize = 100;

/// Default dead-letter buffer capacity.
pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 1024;

/// Default timeout for graceful system shutdown (30 seconds).
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Which dispatcher implementation the system runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DispatcherKind {
    /// Single queue with an in-flight threshold
    #[default]
    Basic,

    /// Class-partitioned queues with priority lanes
    Layered,

    /// Layered with the adaptive concurrency tuner enabled
    Adaptive,
}

/// System-wide configuration for the actor runtime.
///
/// # Examples
///
/// ```rust
/// use herald_rt::system::{DispatcherKind, SystemConfig};
/// use std::time::Duration;
///
/// // Use default configuration
/// let config = SystemConfig::default();
/// assert_eq!(config.default_throughput, 100);
///
/// // Use builder for custom configuration
/// let config = SystemConfig::builder()
///     .with_throughput(50)
///     .with_dispatcher(DispatcherKind::Layered)
///     .with_shutdown_timeout(Duration::from_secs(10))
///     .build()
///     .unwrap();
/// assert_eq!(config.default_throughput, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Per-turn message budget for actors without an override
    pub default_throughput: usize,

    /// Default mailbox admission control for actors without an override
    pub backpressure: BackpressureConfig,

    /// Dispatcher implementation
    pub dispatcher: DispatcherKind,

    /// Basic dispatcher settings (used when `dispatcher` is Basic)
    pub basic_dispatcher: BasicDispatcherConfig,

    /// Layered dispatcher settings (used when `dispatcher` is Layered or
    /// Adaptive)
    pub layered_dispatcher: LayeredDispatcherConfig,

    /// Apply the middleware pipeline on send/receive paths
    pub enable_message_pipeline: bool,

    /// Expose the aggregate metrics snapshot
    pub enable_metrics: bool,

    /// Log every delivery at debug level
    pub enable_message_logging: bool,

    /// Dead-letter ring-buffer capacity
    pub dead_letter_capacity: usize,

    /// Timeout for graceful system shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Address tag written onto sender pids when envelopes cross systems
    pub system_address: Option<String>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            default_throughput: DEFAULT_THROUGHPUT,
            backpressure: BackpressureConfig::default(),
            dispatcher: DispatcherKind::default(),
            basic_dispatcher: BasicDispatcherConfig::default(),
            layered_dispatcher: LayeredDispatcherConfig::default(),
            enable_message_pipeline: true,
            enable_metrics: false,
            enable_message_logging: false,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            system_address: None,
        }
    }
}

impl SystemConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SystemConfigBuilder {
        SystemConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_throughput == 0 {
            return Err("default_throughput must be > 0".to_string());
        }
        if self.dead_letter_capacity == 0 {
            return Err("dead_letter_capacity must be > 0".to_string());
        }
        if self.shutdown_timeout.is_zero() {
            return Err("shutdown_timeout must be > 0".to_string());
        }
        self.backpressure.validate()
    }
}

/// Builder for [`SystemConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct SystemConfigBuilder {
    config: SystemConfig,
}

impl SystemConfigBuilder {
    /// Set the per-turn message budget.
    pub fn with_throughput(mut self, budget: usize) -> Self {
        self.config.default_throughput = budget;
        self
    }

    /// Set the default mailbox admission control.
    pub fn with_backpressure(mut self, backpressure: BackpressureConfig) -> Self {
        self.config.backpressure = backpressure;
        self
    }

    /// Select the dispatcher implementation.
    pub fn with_dispatcher(mut self, kind: DispatcherKind) -> Self {
        self.config.dispatcher = kind;
        self
    }

    /// Tune the basic dispatcher.
    pub fn with_basic_dispatcher(mut self, config: BasicDispatcherConfig) -> Self {
        self.config.basic_dispatcher = config;
        self
    }

    /// Tune the layered dispatcher.
    pub fn with_layered_dispatcher(mut self, config: LayeredDispatcherConfig) -> Self {
        self.config.layered_dispatcher = config;
        self
    }

    /// Toggle the middleware pipeline.
    pub fn with_message_pipeline(mut self, enabled: bool) -> Self {
        self.config.enable_message_pipeline = enabled;
        self
    }

    /// Toggle the aggregate metrics snapshot.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.config.enable_metrics = enabled;
        self
    }

    /// Toggle per-delivery debug logging.
    pub fn with_message_logging(mut self, enabled: bool) -> Self {
        self.config.enable_message_logging = enabled;
        self
    }

    /// Set the dead-letter buffer capacity.
    pub fn with_dead_letter_capacity(mut self, capacity: usize) -> Self {
        self.config.dead_letter_capacity = capacity;
        self
    }

    /// Set the graceful-shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.shutdown_timeout = timeout;
        self
    }

    /// Set the address tag for cross-system sends.
    pub fn with_system_address(mut self, address: impl Into<String>) -> Self {
        self.config.system_address = Some(address.into());
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<SystemConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}
