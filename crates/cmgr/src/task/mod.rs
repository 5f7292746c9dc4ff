//! Remote task execution
//!
//! Every task yields exactly one [`Response`]; failures are encoded in the
//! response, never returned as errors.

mod reconfigure;

pub use reconfigure::{
    active_pipeline, execute_reconfigure, LogPipeline, ReconfigureParams, PIPELINE_PATH,
};

use crate::collector::Collector;
use collector_manager_core::{Response, Task, TaskKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Exit code reported when a remote shutdown task stops the manager
pub const SHUTDOWN_EXIT_CODE: i32 = 216;

/// Run `task` against the collector and produce its response.
pub async fn execute_task(
    task: &Task,
    collector: &dyn Collector,
    exit: &mpsc::Sender<i32>,
) -> Response {
    match task.kind() {
        TaskKind::Reconfigure => execute_reconfigure(task, collector).await,
        TaskKind::Restart => execute_restart(task, collector).await,
        TaskKind::Shutdown => execute_shutdown(task, exit),
        TaskKind::Unknown => {
            warn!(task_type = %task.task_type, id = %task.id, "Unsupported task type");
            task.failure("unsupported type", format!("unknown task type {:?}", task.task_type))
        }
    }
}

async fn execute_restart(task: &Task, collector: &dyn Collector) -> Response {
    match collector.restart().await {
        Ok(()) => {
            info!(id = %task.id, "Collector restarted");
            task.success()
        }
        Err(e) => task.failure("failed to restart collector", e),
    }
}

fn execute_shutdown(task: &Task, exit: &mpsc::Sender<i32>) -> Response {
    info!(id = %task.id, "Shutdown requested");
    // The slot holds one code; a second request finds it full and changes nothing.
    let _ = exit.try_send(SHUTDOWN_EXIT_CODE);
    task.success()
}
