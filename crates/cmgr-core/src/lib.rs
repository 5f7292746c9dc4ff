//! Core types for the collector-manager control channel
//!
//! This crate provides the data structures exchanged with the remote
//! management service and the manager's own settings.
//!
//! All wire types are designed to:
//! - Travel inside a generic [`Message`] envelope as JSON content
//! - Use camelCase field names on both encode and decode paths
//! - Decode back into the typed value they were encoded from

pub mod config;
pub mod logging;
pub mod message;
pub mod schema;

pub use config::{CollectorSettings, Config, ConfigError};
pub use message::{Message, MessageError};
pub use schema::{
    Metric, MetricKey, Report, ReportStatus, Response, ResponseStatus, Startup, Task, TaskKind,
};
