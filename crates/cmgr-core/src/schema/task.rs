//! Remote task requests and their responses

use crate::message::{self, Message, MessageError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A remotely requested operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(rename = "type")]
    pub task_type: String,
    pub id: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

/// Known task types; anything else is [`TaskKind::Unknown`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Reconfigure,
    Restart,
    Shutdown,
    Unknown,
}

impl TaskKind {
    pub fn parse(task_type: &str) -> Self {
        match task_type {
            "reconfigure" => Self::Reconfigure,
            "restart" => Self::Restart,
            "shutdown" => Self::Shutdown,
            _ => Self::Unknown,
        }
    }
}

impl Task {
    /// Decode a task from an inbound message tagged as a task request.
    pub fn from_message(msg: &Message) -> Result<Self, MessageError> {
        msg.decode_tagged(message::TASK)
    }

    pub fn kind(&self) -> TaskKind {
        TaskKind::parse(&self.task_type)
    }

    /// Successful response echoing this task.
    pub fn success(&self) -> Response {
        self.respond(ResponseStatus::Success, String::new(), Map::new())
    }

    /// Failed response echoing this task. The error text lands in `details.error`.
    pub fn failure(&self, message: impl Into<String>, err: impl fmt::Display) -> Response {
        let mut details = Map::new();
        details.insert("error".to_string(), Value::String(err.to_string()));
        self.respond(ResponseStatus::Failure, message.into(), details)
    }

    /// Response for a task that could not be run to completion at all.
    pub fn exception(&self, message: impl Into<String>) -> Response {
        self.respond(ResponseStatus::Exception, message.into(), Map::new())
    }

    fn respond(
        &self,
        status: ResponseStatus,
        message: String,
        details: Map<String, Value>,
    ) -> Response {
        Response {
            task_type: self.task_type.clone(),
            id: self.id.clone(),
            status,
            message,
            details,
        }
    }
}

/// Outcome of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Running,
    Success,
    Failure,
    Exception,
}

/// The one reply sent for each task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(rename = "type")]
    pub task_type: String,
    pub id: String,
    pub status: ResponseStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl Response {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::new(message::TASK_RESPONSE, self)
    }
}
