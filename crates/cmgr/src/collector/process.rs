//! Child-process collector driver
//!
//! Runs `<binary> --config <path>` and validates configs with
//! `<binary> validate --config <path>`.

use super::{Collector, CollectorError, CollectorStatus, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long a freshly spawned collector must stay up to count as started
const STARTUP_GRACE: Duration = Duration::from_secs(2);

/// A spawned collector and the task that reaps it
struct RunningProcess {
    stop: CancellationToken,
    waiter: JoinHandle<()>,
}

/// Collector backed by an external executable
pub struct ProcessCollector {
    binary: PathBuf,
    config_path: PathBuf,
    /// Serializes run/stop/restart
    process: tokio::sync::Mutex<Option<RunningProcess>>,
    status: Arc<Mutex<CollectorStatus>>,
}

impl ProcessCollector {
    pub fn new(binary: impl Into<PathBuf>, config_path: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config_path: config_path.into(),
            process: tokio::sync::Mutex::new(None),
            status: Arc::new(Mutex::new(CollectorStatus::default())),
        }
    }

    fn set_status(status: &Mutex<CollectorStatus>, running: bool, err: Option<CollectorError>) {
        let mut guard = status.lock().unwrap_or_else(|e| e.into_inner());
        guard.running = running;
        guard.err = err;
    }

    async fn start_locked(&self, slot: &mut Option<RunningProcess>) -> Result<()> {
        if let Some(existing) = slot.as_ref() {
            if !existing.waiter.is_finished() {
                return Err(CollectorError::AlreadyRunning);
            }
            // The previous process exited on its own; its status is already recorded.
            slot.take();
        }

        let mut child = Command::new(&self.binary)
            .arg("--config")
            .arg(&self.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let err = CollectorError::StartFailed {
                    message: format!("spawn {}: {e}", self.binary.display()),
                };
                Self::set_status(&self.status, false, Some(err.clone()));
                err
            })?;

        if let Ok(exit) = tokio::time::timeout(STARTUP_GRACE, child.wait()).await {
            let message = match exit {
                Ok(status) => format!("exited during startup with {status}"),
                Err(e) => format!("failed to wait on collector: {e}"),
            };
            let err = CollectorError::StartFailed { message };
            Self::set_status(&self.status, false, Some(err.clone()));
            return Err(err);
        }

        info!(pid = ?child.id(), "Collector started");
        Self::set_status(&self.status, true, None);

        let stop = CancellationToken::new();
        let waiter = tokio::spawn(supervise(child, stop.clone(), self.status.clone()));
        *slot = Some(RunningProcess { stop, waiter });
        Ok(())
    }

    async fn stop_locked(&self, slot: &mut Option<RunningProcess>) {
        let Some(running) = slot.take() else {
            return;
        };
        running.stop.cancel();
        if let Err(e) = running.waiter.await {
            error!("Collector supervisor task panicked: {}", e);
        }
        let mut guard = self.status.lock().unwrap_or_else(|e| e.into_inner());
        guard.running = false;
    }
}

/// Wait for the child to exit or for a stop request, recording unexpected exits.
async fn supervise(mut child: Child, stop: CancellationToken, status: Arc<Mutex<CollectorStatus>>) {
    tokio::select! {
        exit = child.wait() => {
            let message = match exit {
                Ok(code) => code.to_string(),
                Err(e) => e.to_string(),
            };
            warn!("Collector exited unexpectedly: {}", message);
            ProcessCollector::set_status(&status, false, Some(CollectorError::Exited { message }));
        }
        _ = stop.cancelled() => {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill collector: {}", e);
            }
            debug!("Collector stopped");
            ProcessCollector::set_status(&status, false, None);
        }
    }
}

#[async_trait]
impl Collector for ProcessCollector {
    async fn run(&self) -> Result<()> {
        let mut slot = self.process.lock().await;
        self.start_locked(&mut slot).await
    }

    async fn stop(&self) {
        let mut slot = self.process.lock().await;
        self.stop_locked(&mut slot).await;
    }

    async fn restart(&self) -> Result<()> {
        let mut slot = self.process.lock().await;
        self.stop_locked(&mut slot).await;
        self.start_locked(&mut slot).await
    }

    fn status(&self) -> CollectorStatus {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    async fn validate_config(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("validate")
            .arg("--config")
            .arg(&self.config_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CollectorError::InvalidConfig {
                message: format!("failed to run validator: {e}"),
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(CollectorError::InvalidConfig {
            message: if stderr.is_empty() {
                format!("validator exited with {}", output.status)
            } else {
                stderr
            },
        })
    }
}
