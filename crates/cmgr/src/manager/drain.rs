//! Final flush of unsent outbound messages

use crate::transport::{self, ConnectionOutcome};
use collector_manager_core::Message;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Overall deadline for the drain connection
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Send whatever is left in `outbound` over one fresh connection.
///
/// The queue is closed first, so no producer can add to it. Failures are
/// logged and never returned: exit must not wait on a dead network.
pub async fn drain(
    endpoint: &str,
    headers: &[(String, String)],
    mut outbound: mpsc::Receiver<Message>,
    deadline: Duration,
) {
    outbound.close();
    if outbound.is_empty() {
        debug!("No unsent messages to drain");
        return;
    }

    info!(pending = outbound.len(), "Draining unsent messages");
    let deadline = Instant::now() + deadline;

    let conn = match timeout_at(deadline, transport::open(endpoint, headers)).await {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            warn!(pending = outbound.len(), "Failed to open drain connection: {}", e);
            return;
        }
        Err(_) => {
            warn!(pending = outbound.len(), "Timed out opening drain connection");
            return;
        }
    };

    let (mut sink, _stream) = conn.split();
    let never = CancellationToken::new();
    match timeout_at(deadline, transport::send(&never, &mut sink, &mut outbound)).await {
        Ok(ConnectionOutcome::Drained) => info!("Drained all unsent messages"),
        Ok(ConnectionOutcome::HardError(e)) => {
            warn!(pending = outbound.len(), "Drain failed: {}", e);
        }
        Ok(outcome) => debug!(?outcome, "Drain ended early"),
        Err(_) => warn!(pending = outbound.len(), "Timed out draining unsent messages"),
    }

    transport::close(&mut sink).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_queue_skips_connection() {
        let (tx, rx) = mpsc::channel::<Message>(4);
        drop(tx);

        // An unroutable endpoint would fail or stall if it were dialed
        let result = tokio::time::timeout(
            Duration::from_secs(1),
            drain("ws://192.0.2.1:9/v1/connect", &[], rx, DRAIN_TIMEOUT),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_gives_up() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Message::new("statusReport", &()).unwrap()).await.unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            drain("ws://127.0.0.1:9/v1/connect", &[], rx, Duration::from_millis(500)),
        )
        .await;
        assert!(result.is_ok());
    }
}
