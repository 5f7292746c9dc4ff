//! Local WebSocket server used by the integration tests

#![allow(dead_code)]

use collector_manager_core::Message;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::tungstenite::Message as Frame;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub type ServerConnection = WebSocketStream<TcpStream>;

pub struct TestServer {
    pub endpoint: String,
    listener: TcpListener,
}

impl TestServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}/v1/connect", listener.local_addr().unwrap());
        Self { endpoint, listener }
    }

    /// Accept one connection, returning it with the handshake headers.
    pub async fn accept(&self) -> (ServerConnection, HeaderMap) {
        let (stream, _) = self.listener.accept().await.unwrap();
        let mut headers = HeaderMap::new();
        let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            headers = request.headers().clone();
            Ok(response)
        };
        let ws = accept_hdr_async(stream, callback).await.unwrap();
        (ws, headers)
    }
}

/// Event observed by a recording server
#[derive(Debug)]
pub enum ServerEvent {
    Connected(usize),
    Received(usize, Message),
    Disconnected(usize),
}

/// Behavior of a recording server for each accepted connection
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Messages pushed to the client on the first connection only
    pub greet_first: Vec<Message>,
    /// Close every connection right after the handshake
    pub close_immediately: bool,
}

/// Accept connections forever, reporting everything clients send.
pub fn spawn_recording_server(
    server: TestServer,
    script: Script,
) -> mpsc::UnboundedReceiver<ServerEvent> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut index = 0;
        loop {
            let (mut ws, _headers) = server.accept().await;
            let _ = events_tx.send(ServerEvent::Connected(index));

            if script.close_immediately {
                let _ = ws.close(None).await;
                let _ = events_tx.send(ServerEvent::Disconnected(index));
                index += 1;
                continue;
            }

            if index == 0 {
                for message in &script.greet_first {
                    let text = serde_json::to_string(message).unwrap();
                    ws.send(Frame::Text(text)).await.unwrap();
                }
            }

            let events = events_tx.clone();
            tokio::spawn(async move {
                while let Some(Ok(frame)) = ws.next().await {
                    if let Frame::Text(text) = frame {
                        let message: Message = serde_json::from_str(&text).unwrap();
                        let _ = events.send(ServerEvent::Received(index, message));
                    }
                }
                let _ = events.send(ServerEvent::Disconnected(index));
            });
            index += 1;
        }
    });

    events_rx
}

pub fn text_frame(message: &Message) -> Frame {
    Frame::Text(serde_json::to_string(message).unwrap())
}
