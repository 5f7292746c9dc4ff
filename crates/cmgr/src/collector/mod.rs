//! Control surface of the managed telemetry collector
//!
//! The manager never looks inside the collector's pipeline. It starts,
//! stops, restarts and validates it, and reads or rewrites its config file.
//! Implementations include a child-process driver (production) and an
//! in-memory mock (testing).

mod mock;
mod process;

pub use mock::MockCollector;
pub use process::ProcessCollector;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type for collector operations
pub type Result<T> = std::result::Result<T, CollectorError>;

/// Shared handle used by the manager's handlers
pub type SharedCollector = Arc<dyn Collector>;

/// Collector errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollectorError {
    /// Run was called while the collector is running
    #[error("collector already running")]
    AlreadyRunning,

    /// The collector could not be started
    #[error("failed to start collector: {message}")]
    StartFailed { message: String },

    /// The collector exited on its own
    #[error("collector exited unexpectedly: {message}")]
    Exited { message: String },

    /// The configuration file was rejected
    #[error("invalid collector config: {message}")]
    InvalidConfig { message: String },
}

/// Running state plus the last error observed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectorStatus {
    pub running: bool,
    pub err: Option<CollectorError>,
}

/// Collector abstraction
///
/// Implementations must be thread-safe (Send + Sync); the lifecycle handler
/// and the task handler both hold the same handle.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Start the collector
    ///
    /// # Errors
    ///
    /// Returns error if already running or if startup fails
    async fn run(&self) -> Result<()>;

    /// Stop the collector. Stopping a stopped collector is a no-op.
    async fn stop(&self);

    /// Stop, then run again
    async fn restart(&self) -> Result<()>;

    /// Current running state and last error
    fn status(&self) -> CollectorStatus;

    /// Path of the collector's YAML configuration file
    fn config_path(&self) -> PathBuf;

    /// Dry-run the current config file without touching the live collector
    async fn validate_config(&self) -> Result<()>;
}
