//! Typed payloads carried inside [`crate::Message`] content

mod report;
mod startup;
mod task;

pub use report::{Metric, MetricKey, Report, ReportStatus, COMPONENT_TYPE};
pub use startup::Startup;
pub use task::{Response, ResponseStatus, Task, TaskKind};
