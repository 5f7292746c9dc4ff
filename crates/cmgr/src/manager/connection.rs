//! Reconnecting control channel

use super::backoff::Backoff;
use crate::transport::{self, ConnectionOutcome};
use collector_manager_core::{Config, Message};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Everything the connection handler needs from the manager config
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: String,
    pub headers: Vec<(String, String)>,
    /// Maximum lifetime of one session before it is rotated
    pub reconnect_interval: Duration,
    /// Ceiling for the delay between failed attempts
    pub max_backoff: Duration,
}

impl ConnectionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            headers: connection_headers(config),
            reconnect_interval: config.reconnect_interval(),
            max_backoff: config.max_connect_backoff(),
        }
    }
}

/// Handshake headers identifying this agent.
pub fn connection_headers(config: &Config) -> Vec<(String, String)> {
    let hostname = hostname::get()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    vec![
        ("Secret-Key".to_string(), config.secret_key.clone()),
        ("Agent-Id".to_string(), config.agent_id.clone()),
        ("Hostname".to_string(), hostname),
        ("Version".to_string(), env!("CARGO_PKG_VERSION").to_string()),
        ("Operating-System".to_string(), std::env::consts::OS.to_string()),
        ("Architecture".to_string(), std::env::consts::ARCH.to_string()),
    ]
}

/// Keep one session open at a time until `cancel` fires.
///
/// Both queues outlive individual sessions, so traffic queued while
/// disconnected goes out on the next session. The outbound receiver is
/// handed back for draining.
pub async fn run_connection(
    cancel: CancellationToken,
    settings: ConnectionSettings,
    inbound: mpsc::Sender<Message>,
    mut outbound: mpsc::Receiver<Message>,
) -> mpsc::Receiver<Message> {
    let mut backoff = Backoff::new(settings.max_backoff);
    let mut attempt: u32 = 0;

    loop {
        let delay = backoff.next_delay();
        if !delay.is_zero() {
            debug!("Waiting {:?} before reconnecting", delay);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            opened = transport::open(&settings.endpoint, &settings.headers) => opened,
        };

        let conn = match opened {
            Ok(conn) => conn,
            Err(e) => {
                error!(attempt, "Failed to open connection: {}", e);
                continue;
            }
        };

        info!(attempt, "Connected to {}", settings.endpoint);
        attempt = 0;
        backoff.reset();

        let outcome = transport::handle_traffic(
            &cancel,
            Some(settings.reconnect_interval),
            conn,
            &inbound,
            &mut outbound,
        )
        .await;

        match outcome {
            ConnectionOutcome::HardError(e) => error!("Unexpected connection error: {}", e),
            ConnectionOutcome::Drained => {
                debug!("Outbound queue closed, stopping connection handler");
                break;
            }
            outcome => debug!(?outcome, "Session ended"),
        }
    }

    debug!("Connection handler stopped");
    outbound
}
