//! Periodic health report

use crate::message::{self, Message, MessageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Component type reported for the managed collector
pub const COMPONENT_TYPE: &str = "collector";

/// Collector health as seen by the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Disabled,
    Active,
    Error,
}

/// Names of the performance metrics carried in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    CpuPercent,
    MemoryUsed,
    MemoryAvailable,
    NetworkDataIn,
    NetworkDataOut,
}

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CpuPercent => "cpu_percent",
            Self::MemoryUsed => "memory_used",
            Self::MemoryAvailable => "memory_available",
            Self::NetworkDataIn => "network_data_in",
            Self::NetworkDataOut => "network_data_out",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sampled value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "type")]
    pub metric_type: MetricKey,
    pub value: f64,
    /// Unix seconds
    pub timestamp: i64,
}

/// Point-in-time health snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub component_type: String,
    pub component_id: String,
    pub status: ReportStatus,
    #[serde(default)]
    pub metrics: BTreeMap<String, Metric>,
}

impl Report {
    pub fn new(component_id: impl Into<String>, status: ReportStatus) -> Self {
        Self {
            component_type: COMPONENT_TYPE.to_string(),
            component_id: component_id.into(),
            status,
            metrics: BTreeMap::new(),
        }
    }

    /// Add a metric under `key`, replacing any previous value for that key.
    pub fn with_metric(&mut self, key: impl Into<String>, metric: Metric) {
        self.metrics.insert(key.into(), metric);
    }

    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::new(message::STATUS_REPORT, self)
    }
}
