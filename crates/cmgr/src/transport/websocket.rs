//! WebSocket implementation of the message transport

use super::{ConnectionOutcome, Result, TransportError};
use collector_manager_core::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as Frame};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A live client connection
pub type Connection = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the graceful close handshake
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Open a connection to `endpoint`, sending `headers` with the handshake.
///
/// # Errors
///
/// Returns [`TransportError::InvalidHeader`] if a header cannot be encoded and
/// [`TransportError::Dial`] if the endpoint is unreachable or rejects the upgrade.
pub async fn open(endpoint: &str, headers: &[(String, String)]) -> Result<Connection> {
    let mut request = endpoint
        .into_client_request()
        .map_err(TransportError::Dial)?;

    for (name, value) in headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| TransportError::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
        let header_value =
            HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
                name: name.clone(),
                message: e.to_string(),
            })?;
        request.headers_mut().insert(header_name, header_value);
    }

    let (conn, _response) = connect_async(request).await.map_err(TransportError::Dial)?;
    Ok(conn)
}

/// Best-effort graceful close: send a close frame within [`CLOSE_TIMEOUT`].
///
/// If the frame cannot be sent in time the caller simply drops the
/// connection, which tears down the socket.
pub async fn close<S>(sink: &mut S)
where
    S: Sink<Frame, Error = WsError> + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Frame::Close(Some(frame)))).await {
        Ok(Ok(())) => debug!("Sent close frame"),
        Ok(Err(e)) => debug!("Close frame failed, dropping connection: {}", e),
        Err(_) => debug!("Close frame timed out, dropping connection"),
    }
}

/// Read frames into `inbound` until the connection ends or `cancel` fires.
///
/// Room in `inbound` is reserved before each read, so a full queue pauses
/// reading and a frame is only taken off the connection once it can be
/// delivered. Ending the session never discards a decoded message.
pub async fn receive<S>(
    cancel: &CancellationToken,
    stream: &mut S,
    inbound: &mpsc::Sender<Message>,
) -> ConnectionOutcome
where
    S: Stream<Item = std::result::Result<Frame, WsError>> + Unpin,
{
    loop {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ConnectionOutcome::Cancelled,
            permit = inbound.reserve() => match permit {
                Ok(permit) => permit,
                // Nobody consumes inbound traffic any more
                Err(_) => return ConnectionOutcome::Cancelled,
            },
        };

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ConnectionOutcome::Cancelled,
            next = stream.next() => next,
        };

        let decoded = match next {
            None | Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                return ConnectionOutcome::GracefulClose;
            }
            Some(Err(e)) => return ConnectionOutcome::HardError(TransportError::Read(e)),
            Some(Ok(Frame::Close(frame))) => {
                debug!(?frame, "Peer closed connection");
                return ConnectionOutcome::GracefulClose;
            }
            Some(Ok(Frame::Text(text))) => serde_json::from_str::<Message>(&text),
            Some(Ok(Frame::Binary(bytes))) => serde_json::from_slice::<Message>(&bytes),
            // Control frames are answered by the protocol layer
            Some(Ok(_)) => continue,
        };

        match decoded {
            Ok(message) => permit.send(message),
            Err(e) => return ConnectionOutcome::HardError(TransportError::Decode(e)),
        }
    }
}

/// Write messages from `outbound` until the queue is closed and empty,
/// a write fails, or `cancel` fires.
pub async fn send<S>(
    cancel: &CancellationToken,
    sink: &mut S,
    outbound: &mut mpsc::Receiver<Message>,
) -> ConnectionOutcome
where
    S: Sink<Frame, Error = WsError> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return ConnectionOutcome::Cancelled,
            next = outbound.recv() => next,
        };

        let Some(message) = next else {
            return ConnectionOutcome::Drained;
        };

        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => return ConnectionOutcome::HardError(TransportError::Encode(e)),
        };

        if let Err(e) = sink.send(Frame::Text(text)).await {
            return ConnectionOutcome::HardError(TransportError::Write(e));
        }
    }
}

/// Pump traffic in both directions over `conn`.
///
/// Returns as soon as receiving ends, sending ends, `cancel` fires, or
/// `max_lifetime` elapses; the connection is then closed.
pub async fn handle_traffic<S>(
    cancel: &CancellationToken,
    max_lifetime: Option<Duration>,
    conn: S,
    inbound: &mpsc::Sender<Message>,
    outbound: &mut mpsc::Receiver<Message>,
) -> ConnectionOutcome
where
    S: Stream<Item = std::result::Result<Frame, WsError>> + Sink<Frame, Error = WsError> + Unpin,
{
    let (mut sink, mut stream) = conn.split();
    let expired = async {
        match max_lifetime {
            Some(lifetime) => tokio::time::sleep(lifetime).await,
            None => std::future::pending().await,
        }
    };

    let outcome = tokio::select! {
        outcome = receive(cancel, &mut stream, inbound) => outcome,
        outcome = send(cancel, &mut sink, outbound) => outcome,
        _ = cancel.cancelled() => ConnectionOutcome::Cancelled,
        _ = expired => ConnectionOutcome::TimedOut,
    };

    close(&mut sink).await;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::convert::Infallible;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn text_frame(message_type: &str) -> Frame {
        let msg = Message::new(message_type, &serde_json::json!({"n": 1})).unwrap();
        Frame::Text(serde_json::to_string(&msg).unwrap())
    }

    /// Sink that rejects every frame
    struct BrokenSink;

    impl Sink<Frame> for BrokenSink {
        type Error = WsError;

        fn poll_ready(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Err(WsError::Io(std::io::Error::from(
                std::io::ErrorKind::BrokenPipe,
            ))))
        }

        fn start_send(self: Pin<&mut Self>, _item: Frame) -> std::result::Result<(), WsError> {
            Ok(())
        }

        fn poll_flush(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::result::Result<(), WsError>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_receive_then_graceful_close() {
        let mut frames = stream::iter(vec![
            Ok(text_frame("first")),
            Ok(Frame::Ping(vec![1])),
            Ok(Frame::Binary(
                serde_json::to_vec(&Message::new("second", &()).unwrap()).unwrap(),
            )),
            Ok(Frame::Close(None)),
        ]);
        let (tx, mut rx) = mpsc::channel(5);

        let outcome = receive(&CancellationToken::new(), &mut frames, &tx).await;

        assert!(matches!(outcome, ConnectionOutcome::GracefulClose));
        assert_eq!(rx.recv().await.unwrap().message_type, "first");
        assert_eq!(rx.recv().await.unwrap().message_type, "second");
    }

    #[tokio::test]
    async fn test_receive_waits_for_room_before_reading() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(Message::new("queued", &()).unwrap()).await.unwrap();
        let mut frames = stream::iter(vec![Ok(text_frame("next"))]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let outcome = receive(&cancel, &mut frames, &tx).await;
        assert!(matches!(outcome, ConnectionOutcome::Cancelled));

        // The frame stays on the connection for the next reader
        assert_eq!(rx.recv().await.unwrap().message_type, "queued");
        assert_eq!(frames.next().await.unwrap().unwrap(), text_frame("next"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_receive_abrupt_failure_is_read_error() {
        let mut frames = stream::iter(vec![Err(WsError::Io(std::io::Error::from(
            std::io::ErrorKind::ConnectionReset,
        )))]);
        let (tx, _rx) = mpsc::channel(5);

        let outcome = receive(&CancellationToken::new(), &mut frames, &tx).await;

        match outcome {
            ConnectionOutcome::HardError(err) => {
                assert!(matches!(err, TransportError::Read(_)));
                assert!(err.to_string().contains("unknown read error"));
            }
            other => panic!("expected read error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_receive_connection_closed_is_graceful() {
        let mut frames = stream::iter(vec![Err(WsError::ConnectionClosed)]);
        let (tx, _rx) = mpsc::channel(5);

        let outcome = receive(&CancellationToken::new(), &mut frames, &tx).await;
        assert!(matches!(outcome, ConnectionOutcome::GracefulClose));
    }

    #[tokio::test]
    async fn test_receive_bad_frame() {
        let mut frames = stream::iter(vec![Ok(Frame::Text("not json".to_string()))]);
        let (tx, _rx) = mpsc::channel(5);

        let outcome = receive(&CancellationToken::new(), &mut frames, &tx).await;
        assert!(matches!(
            outcome,
            ConnectionOutcome::HardError(TransportError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_receive_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut frames = stream::pending::<std::result::Result<Frame, WsError>>();
        let (tx, _rx) = mpsc::channel(5);

        let outcome = receive(&cancel, &mut frames, &tx).await;
        assert!(matches!(outcome, ConnectionOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_send_drains_closed_queue_in_order() {
        let (tx, mut rx) = mpsc::channel(5);
        for tag in ["a", "b", "c"] {
            tx.send(Message::new(tag, &()).unwrap()).await.unwrap();
        }
        drop(tx);

        let mut written: Vec<Frame> = Vec::new();
        let mut sink =
            (&mut written).sink_map_err(|never: Infallible| -> WsError { match never {} });
        let outcome = send(&CancellationToken::new(), &mut sink, &mut rx).await;
        drop(sink);

        assert!(matches!(outcome, ConnectionOutcome::Drained));
        let tags: Vec<String> = written
            .iter()
            .map(|frame| match frame {
                Frame::Text(text) => serde_json::from_str::<Message>(text).unwrap().message_type,
                other => panic!("unexpected frame {other:?}"),
            })
            .collect();
        assert_eq!(tags, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_send_write_failure() {
        let (tx, mut rx) = mpsc::channel(5);
        tx.send(Message::new("a", &()).unwrap()).await.unwrap();

        let outcome = send(&CancellationToken::new(), &mut BrokenSink, &mut rx).await;
        match outcome {
            ConnectionOutcome::HardError(err) => {
                assert!(err.to_string().contains("unknown write error"));
            }
            other => panic!("expected write error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_tx, mut rx) = mpsc::channel::<Message>(5);

        let outcome = send(&cancel, &mut BrokenSink, &mut rx).await;
        assert!(matches!(outcome, ConnectionOutcome::Cancelled));
    }

    #[tokio::test]
    async fn test_open_rejects_bad_header() {
        let headers = vec![("Bad Header".to_string(), "x".to_string())];
        let err = open("ws://127.0.0.1:1", &headers).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidHeader { .. }));
    }

    #[tokio::test]
    async fn test_open_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = open(&format!("ws://{addr}"), &[]).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to dial"));
    }
}
