//! One-time "agent started" announcement

use crate::message::{self, Message, MessageError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Host and agent metadata sent once after the collector starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Startup {
    pub home_directory: String,
    pub agent_name: String,
    pub template_id: String,
    /// Falls back to `"unknown"` when no interface address is available
    pub mac_address: String,
    pub operating_system: String,
    /// The collector's active log pipeline, or an empty object
    pub pipeline: Value,
}

impl Startup {
    pub fn to_message(&self) -> Result<Message, MessageError> {
        Message::new(message::ON_STARTUP, self)
    }
}
