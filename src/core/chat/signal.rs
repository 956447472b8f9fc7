//! Out-of-band control events.

use serde::{Deserialize, Serialize};

use super::data::ChatDataType;

/// Kind of control event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatSignalType {
    /// Start a new generation round for `stream_type`.
    Begin,
    /// Cancel in-flight generation.
    Interrupt,
}

/// Where a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatSignalSourceType {
    /// The remote peer, through the transport.
    Client,
    /// A pipeline handler.
    Handler,
    /// The engine scheduler.
    Engine,
}

/// Control event delivered at most once per emission; never queued for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSignal {
    #[serde(rename = "type")]
    pub signal_type: ChatSignalType,
    pub source_type: ChatSignalSourceType,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<ChatDataType>,
}

impl ChatSignal {
    /// Signal raised by the peer on the transport named `source_name`.
    pub fn from_client(signal_type: ChatSignalType, source_name: impl Into<String>) -> Self {
        Self {
            signal_type,
            source_type: ChatSignalSourceType::Client,
            source_name: source_name.into(),
            stream_type: None,
        }
    }

    pub fn with_stream_type(mut self, stream_type: ChatDataType) -> Self {
        self.stream_type = Some(stream_type);
        self
    }
}
