//! Message envelope carried over the control connection
//!
//! Every frame in either direction is one [`Message`]: a protocol tag plus a
//! JSON payload. Typed payloads are converted at the edges with
//! [`Message::new`] and [`Message::decode`].

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tag for the periodic health report sent by the agent.
pub const STATUS_REPORT: &str = "statusReport";
/// Tag for a task request sent by the management service.
pub const TASK: &str = "task";
/// Tag for the reply to a task.
pub const TASK_RESPONSE: &str = "taskResponse";
/// Tag for the one-time announcement sent after the collector starts.
pub const ON_STARTUP: &str = "onStartup";

/// Errors produced while converting payloads to and from a [`Message`].
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// The payload could not be encoded as JSON content
    #[error("failed to encode content: {0}")]
    Encode(#[source] serde_json::Error),

    /// The content does not have the shape of the requested type
    #[error("failed to decode content: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message carries a different tag than the one expected
    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: String,
    },
}

/// Typed envelope `{type, content}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub content: Value,
}

impl Message {
    /// Build a message by encoding `payload` as the content.
    pub fn new<T: Serialize>(
        message_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, MessageError> {
        let content = serde_json::to_value(payload).map_err(MessageError::Encode)?;
        Ok(Self {
            message_type: message_type.into(),
            content,
        })
    }

    /// Decode the content into a typed payload.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, MessageError> {
        T::deserialize(&self.content).map_err(MessageError::Decode)
    }

    /// Decode the content, requiring the message to carry `expected` as its tag.
    pub fn decode_tagged<T: DeserializeOwned>(
        &self,
        expected: &'static str,
    ) -> Result<T, MessageError> {
        if self.message_type != expected {
            return Err(MessageError::UnexpectedType {
                expected,
                actual: self.message_type.clone(),
            });
        }
        self.decode()
    }
}
