//! Host performance sampling for status reports

use collector_manager_core::{Metric, MetricKey, Report};
use sysinfo::{Networks, System};

/// Sampling errors
#[derive(Debug, thiserror::Error)]
pub enum PerformanceError {
    #[error("error reading CPU metrics: no CPUs reported")]
    CpuUnavailable,

    #[error("error getting virtual memory statistics")]
    MemoryUnavailable,
}

/// Samples CPU, memory and network counters
///
/// CPU usage is measured between consecutive samples, so one sampler should
/// live for as long as reports are produced.
pub struct PerformanceSampler {
    system: System,
    networks: Networks,
}

impl Default for PerformanceSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        Self {
            system,
            networks: Networks::new_with_refreshed_list(),
        }
    }

    /// Append performance metrics to `report`.
    ///
    /// Every metric that can be read is added even when another fails; the
    /// first failure is returned for logging.
    pub fn add_performance_metrics(&mut self, report: &mut Report) -> Result<(), PerformanceError> {
        let timestamp = chrono::Utc::now().timestamp();
        let cpu = self.add_cpu_metrics(report, timestamp);
        let memory = self.add_memory_metrics(report, timestamp);
        self.add_network_metrics(report, timestamp);
        cpu.and(memory)
    }

    fn add_cpu_metrics(
        &mut self,
        report: &mut Report,
        timestamp: i64,
    ) -> Result<(), PerformanceError> {
        self.system.refresh_cpu_usage();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return Err(PerformanceError::CpuUnavailable);
        }

        for (core, cpu) in cpus.iter().enumerate() {
            report.with_metric(
                format!("{}_{core}", MetricKey::CpuPercent),
                metric(MetricKey::CpuPercent, f64::from(cpu.cpu_usage()), timestamp),
            );
        }
        Ok(())
    }

    fn add_memory_metrics(
        &mut self,
        report: &mut Report,
        timestamp: i64,
    ) -> Result<(), PerformanceError> {
        self.system.refresh_memory();
        if self.system.total_memory() == 0 {
            return Err(PerformanceError::MemoryUnavailable);
        }

        report.with_metric(
            MetricKey::MemoryUsed.as_str(),
            metric(MetricKey::MemoryUsed, self.system.used_memory() as f64, timestamp),
        );
        report.with_metric(
            MetricKey::MemoryAvailable.as_str(),
            metric(MetricKey::MemoryAvailable, self.system.available_memory() as f64, timestamp),
        );
        Ok(())
    }

    /// Per-interface byte counters; interfaces sharing a name are reported once.
    fn add_network_metrics(&mut self, report: &mut Report, timestamp: i64) {
        self.networks.refresh();
        for (name, data) in self.networks.iter() {
            report.with_metric(
                format!("{}_{name}", MetricKey::NetworkDataIn),
                metric(MetricKey::NetworkDataIn, data.total_received() as f64, timestamp),
            );
            report.with_metric(
                format!("{}_{name}", MetricKey::NetworkDataOut),
                metric(MetricKey::NetworkDataOut, data.total_transmitted() as f64, timestamp),
            );
        }
    }
}

fn metric(metric_type: MetricKey, value: f64, timestamp: i64) -> Metric {
    Metric {
        metric_type,
        value,
        timestamp,
    }
}
