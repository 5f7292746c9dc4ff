//! Collector Manager - remote management agent for a telemetry collector
//!
//! Keeps a reconnecting WebSocket control channel to a management service,
//! reports collector health on an interval, executes remote tasks
//! (reconfigure, restart, shutdown) and flushes unsent traffic on exit.

pub mod collector;
pub mod manager;
pub mod startup;
pub mod status;
pub mod task;
pub mod transport;

pub use manager::Manager;
