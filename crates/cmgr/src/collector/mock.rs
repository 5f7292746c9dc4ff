//! Mock collector implementation for testing
//!
//! Tracks lifecycle calls in memory and simulates failures on demand.

use super::{Collector, CollectorError, CollectorStatus, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct MockState {
    running: bool,
    err: Option<CollectorError>,
    calls: Vec<String>,
    fail_run: bool,
    fail_restart: bool,
    fail_validate: bool,
}

/// In-memory collector
///
/// Clones share state, so a test can keep one handle for assertions while
/// the manager owns another.
#[derive(Debug, Clone)]
pub struct MockCollector {
    config_path: PathBuf,
    state: Arc<Mutex<MockState>>,
}

impl MockCollector {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    pub fn set_fail_run(&self, fail: bool) {
        self.lock().fail_run = fail;
    }

    pub fn set_fail_restart(&self, fail: bool) {
        self.lock().fail_restart = fail;
    }

    pub fn set_fail_validate(&self, fail: bool) {
        self.lock().fail_validate = fail;
    }

    /// Record a runtime error as if the collector had crashed
    pub fn set_error(&self, err: Option<CollectorError>) {
        let mut state = self.lock();
        state.running = err.is_none() && state.running;
        state.err = err;
    }

    /// Names of the lifecycle calls made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only means a test panicked mid-call; keep the state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn start(state: &mut MockState) -> Result<()> {
        if state.fail_run {
            let err = CollectorError::StartFailed {
                message: "simulated start failure".to_string(),
            };
            state.err = Some(err.clone());
            return Err(err);
        }
        state.running = true;
        state.err = None;
        Ok(())
    }
}

#[async_trait]
impl Collector for MockCollector {
    async fn run(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push("run".to_string());
        if state.running {
            return Err(CollectorError::AlreadyRunning);
        }
        Self::start(&mut state)
    }

    async fn stop(&self) {
        let mut state = self.lock();
        state.calls.push("stop".to_string());
        state.running = false;
    }

    async fn restart(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push("restart".to_string());
        state.running = false;
        if state.fail_restart {
            let err = CollectorError::StartFailed {
                message: "simulated restart failure".to_string(),
            };
            state.err = Some(err.clone());
            return Err(err);
        }
        Self::start(&mut state)
    }

    fn status(&self) -> CollectorStatus {
        let state = self.lock();
        CollectorStatus {
            running: state.running,
            err: state.err.clone(),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    async fn validate_config(&self) -> Result<()> {
        let mut state = self.lock();
        state.calls.push("validate".to_string());
        if state.fail_validate {
            return Err(CollectorError::InvalidConfig {
                message: "simulated validation failure".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lifecycle_calls_are_recorded() {
        let collector = MockCollector::new("config.yaml");
        collector.run().await.unwrap();
        assert!(collector.status().running);

        assert!(matches!(
            collector.run().await,
            Err(CollectorError::AlreadyRunning)
        ));

        collector.restart().await.unwrap();
        collector.stop().await;

        assert!(!collector.status().running);
        assert_eq!(collector.calls(), vec!["run", "run", "restart", "stop"]);
    }

    #[tokio::test]
    async fn test_failed_run_sets_error() {
        let collector = MockCollector::new("config.yaml");
        collector.set_fail_run(true);

        assert!(collector.run().await.is_err());
        let status = collector.status();
        assert!(!status.running);
        assert!(status.err.is_some());
    }
}
