//! Manager: runs the control channel, status reporting, task dispatch and
//! the collector lifecycle, then drains unsent traffic on the way out.

mod backoff;
mod connection;
mod drain;

pub use backoff::{Backoff, INITIAL_BACKOFF};
pub use connection::{connection_headers, run_connection, ConnectionSettings};
pub use drain::{drain, DRAIN_TIMEOUT};

use crate::collector::SharedCollector;
use crate::startup;
use crate::status::{self, PerformanceSampler};
use collector_manager_core::{Config, Message, Task};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Exit code when the manager stops for any reason other than a shutdown task
pub const NORMAL_EXIT_CODE: i32 = 0;

/// Orchestrator owning the message queues and the exit signal
pub struct Manager {
    config: Config,
    collector: SharedCollector,
    inbound_tx: mpsc::Sender<Message>,
    inbound_rx: mpsc::Receiver<Message>,
    outbound_tx: mpsc::Sender<Message>,
    outbound_rx: mpsc::Receiver<Message>,
    exit_tx: mpsc::Sender<i32>,
    exit_rx: mpsc::Receiver<i32>,
    drain_timeout: Duration,
}

impl Manager {
    pub fn new(config: Config, collector: SharedCollector) -> Self {
        let capacity = config.buffer_size.max(1);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        let (exit_tx, exit_rx) = mpsc::channel(1);

        Self {
            config,
            collector,
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
            exit_tx,
            exit_rx,
            drain_timeout: DRAIN_TIMEOUT,
        }
    }

    /// Override the drain deadline (default: [`DRAIN_TIMEOUT`]).
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    /// Run until `cancel` fires or a shutdown task asks to exit, then drain.
    ///
    /// Returns the process exit code: [`crate::task::SHUTDOWN_EXIT_CODE`] after a
    /// shutdown task, [`NORMAL_EXIT_CODE`] otherwise.
    pub async fn run(self, cancel: CancellationToken) -> i32 {
        let Manager {
            config,
            collector,
            inbound_tx,
            inbound_rx,
            outbound_tx,
            outbound_rx,
            exit_tx,
            mut exit_rx,
            drain_timeout,
        } = self;

        let handlers = cancel.child_token();
        let settings = ConnectionSettings::from_config(&config);
        let drain_endpoint = settings.endpoint.clone();
        let drain_headers = settings.headers.clone();

        info!("Starting manager for agent {}", config.agent_id);

        let lifecycle = tokio::spawn(run_lifecycle(
            handlers.clone(),
            collector.clone(),
            config.template_id.clone(),
            config.agent_name.clone(),
            outbound_tx.clone(),
        ));
        let connection = tokio::spawn(run_connection(
            handlers.clone(),
            settings,
            inbound_tx,
            outbound_rx,
        ));
        let reporter = tokio::spawn(run_status(
            handlers.clone(),
            config.agent_id.clone(),
            config.status_interval(),
            collector.clone(),
            outbound_tx.clone(),
        ));
        let dispatcher = tokio::spawn(run_tasks(
            handlers.clone(),
            collector,
            inbound_rx,
            outbound_tx,
            exit_tx.clone(),
        ));

        let exit_code = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Shutdown requested");
                NORMAL_EXIT_CODE
            }
            code = exit_rx.recv() => {
                let code = code.unwrap_or(NORMAL_EXIT_CODE);
                info!(code, "Shutdown task received");
                code
            }
        };
        drop(exit_tx);

        handlers.cancel();
        for (name, handle) in [
            ("lifecycle", lifecycle),
            ("status", reporter),
            ("task", dispatcher),
        ] {
            if let Err(e) = handle.await {
                error!("{} handler failed: {}", name, e);
            }
        }

        match connection.await {
            Ok(outbound) => drain(&drain_endpoint, &drain_headers, outbound, drain_timeout).await,
            Err(e) => error!("connection handler failed, unsent messages are lost: {}", e),
        }

        info!(exit_code, "Manager stopped");
        exit_code
    }
}

/// Queue `message` for sending, waiting for room unless `cancel` fires.
///
/// Room is checked before cancellation so that a response produced just
/// before shutdown still reaches the drain.
async fn enqueue(cancel: &CancellationToken, outbound: &mpsc::Sender<Message>, message: Message) {
    tokio::select! {
        biased;
        sent = outbound.send(message) => {
            if sent.is_err() {
                debug!("Outbound queue closed, dropping message");
            }
        }
        _ = cancel.cancelled() => debug!("Cancelled while waiting for outbound room"),
    }
}

/// Start the collector, announce the agent, and stop the collector on exit.
async fn run_lifecycle(
    cancel: CancellationToken,
    collector: SharedCollector,
    template_id: String,
    agent_name: String,
    outbound: mpsc::Sender<Message>,
) {
    match collector.run().await {
        Ok(()) => info!("Collector started"),
        Err(e) => error!("Failed to start collector: {}", e),
    }

    let startup = startup::new_startup(&template_id, &agent_name, collector.as_ref()).await;
    match startup.to_message() {
        Ok(message) => enqueue(&cancel, &outbound, message).await,
        Err(e) => error!("Failed to encode startup message: {}", e),
    }

    cancel.cancelled().await;
    info!("Stopping collector");
    collector.stop().await;
}

async fn run_status(
    cancel: CancellationToken,
    agent_id: String,
    period: Duration,
    collector: SharedCollector,
    outbound: mpsc::Sender<Message>,
) {
    let mut sampler = PerformanceSampler::new();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let collector_status = collector.status();
        info!(
            running = collector_status.running,
            error = ?collector_status.err,
            "Collector status"
        );

        let mut report = status::get(&agent_id, &collector_status);
        if let Err(e) = sampler.add_performance_metrics(&mut report) {
            warn!("Failed to add performance metrics to status report: {}", e);
        }

        match report.to_message() {
            Ok(message) => enqueue(&cancel, &outbound, message).await,
            Err(e) => error!("Failed to encode status report: {}", e),
        }
    }
}

/// Execute inbound tasks one at a time, answering each with one response.
async fn run_tasks(
    cancel: CancellationToken,
    collector: SharedCollector,
    mut inbound: mpsc::Receiver<Message>,
    outbound: mpsc::Sender<Message>,
    exit: mpsc::Sender<i32>,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            message = inbound.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let task = match Task::from_message(&message) {
            Ok(task) => task,
            Err(e) => {
                warn!(message_type = %message.message_type, "Failed to read task: {}", e);
                continue;
            }
        };

        info!(task_type = %task.task_type, id = %task.id, "Executing task");
        let response = {
            let owned = task.clone();
            let collector = collector.clone();
            let exit = exit.clone();
            tokio::spawn(async move {
                crate::task::execute_task(&owned, collector.as_ref(), &exit).await
            })
            .await
                .unwrap_or_else(|e| {
                    error!(id = %task.id, "Task panicked: {}", e);
                    task.exception(format!("task execution panicked: {e}"))
                })
        };

        match response.to_message() {
            Ok(message) => enqueue(&cancel, &outbound, message).await,
            Err(e) => error!(id = %task.id, "Failed to encode task response: {}", e),
        }
    }
}
