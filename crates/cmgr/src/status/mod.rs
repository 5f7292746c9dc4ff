//! Periodic health reports
//!
//! A report combines the collector's running state with best-effort host
//! performance metrics. Sampling failures never hold a report back.

mod performance;

pub use performance::{PerformanceError, PerformanceSampler};

use crate::collector::CollectorStatus;
use collector_manager_core::{Report, ReportStatus};

/// Build a report for `agent_id` from the collector's current status.
pub fn get(agent_id: &str, collector: &CollectorStatus) -> Report {
    let status = if collector.err.is_some() {
        ReportStatus::Error
    } else {
        ReportStatus::Active
    };
    Report::new(agent_id, status)
}
