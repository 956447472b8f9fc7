//! Side-channel control protocol.
//!
//! ## Peer → relay
//!
//! - `{"type": "stop_chat"}` interrupts in-flight generation.
//! - `{"type": "chat", "data": "..."}` starts a typed human turn.
//!
//! Any other `type` is accepted and ignored.
//!
//! ## Relay → peer
//!
//! - `{"type": "chat", "message": "...", "id": "...", "role": "human" | "avatar"}`
//!   transcript fragment; consecutive fragments of one role share `id`.
//! - `{"type": "avatar_end"}` tells the peer to stop rendering avatar output.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::core::chat::ChatDataType;

/// Maximum accepted size of a typed chat turn (50 KB)
pub const MAX_CHAT_TEXT_SIZE: usize = 50 * 1024;

/// Control message received from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum ControlMessage {
    /// Interrupt the current response round
    #[serde(rename = "stop_chat")]
    StopChat,

    /// Human-typed turn
    #[serde(rename = "chat")]
    Chat {
        /// Turn text
        data: String,
    },

    /// Any message type this relay does not know about
    #[serde(other)]
    Unrecognized,
}

/// Reasons a control message is rejected after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlValidationError {
    /// Chat text exceeds [`MAX_CHAT_TEXT_SIZE`]
    TextTooLarge { size: usize, max: usize },
}

impl fmt::Display for ControlValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TextTooLarge { size, max } => {
                write!(f, "Chat text too large: {} bytes (max: {} bytes)", size, max)
            }
        }
    }
}

impl std::error::Error for ControlValidationError {}

impl ControlMessage {
    /// Parses a raw side-channel message.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Validates field sizes to bound per-message memory.
    pub fn validate_size(&self) -> Result<(), ControlValidationError> {
        if let Self::Chat { data } = self
            && data.len() > MAX_CHAT_TEXT_SIZE
        {
            return Err(ControlValidationError::TextTooLarge {
                size: data.len(),
                max: MAX_CHAT_TEXT_SIZE,
            });
        }
        Ok(())
    }
}

/// Speaker of a transcript fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Human,
    Avatar,
}

impl From<ChatDataType> for TurnRole {
    fn from(data_type: ChatDataType) -> Self {
        if data_type == ChatDataType::HumanText {
            Self::Human
        } else {
            Self::Avatar
        }
    }
}

/// Notification sent to the peer over the side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PeerNotification {
    /// Transcript fragment
    #[serde(rename = "chat")]
    Chat {
        message: String,
        id: String,
        role: TurnRole,
    },

    /// Stop rendering the current avatar output
    #[serde(rename = "avatar_end")]
    AvatarEnd,
}

/// Assigns turn-correlation ids to consecutive transcript fragments.
///
/// A new id is minted whenever the role differs from the previous fragment.
#[derive(Debug, Default)]
pub struct TurnTracker {
    current: Option<(TurnRole, String)>,
}

impl TurnTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, role: TurnRole) -> String {
        match &self.current {
            Some((current_role, id)) if *current_role == role => id.clone(),
            _ => {
                let id = Uuid::new_v4().simple().to_string();
                self.current = Some((role, id.clone()));
                id
            }
        }
    }
}

/// What the interpreter did with one control message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Session has no delegate bound (closing or closed)
    Detached,
    /// Arrived before the start gate elapsed
    Gated,
    /// Not valid JSON or missing required fields
    Malformed,
    /// Failed size validation
    Rejected,
    /// Interrupt signal emitted
    Interrupted,
    /// Begin signal emitted and human text enqueued
    ChatStarted,
    /// VAD already disabled; turn dropped
    ChatSuppressed,
    /// Unknown message type
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stop_chat() {
        let msg = ControlMessage::parse(r#"{"type": "stop_chat"}"#).expect("Should parse");
        assert_eq!(msg, ControlMessage::StopChat);
    }

    #[test]
    fn test_parse_chat() {
        let msg = ControlMessage::parse(r#"{"type": "chat", "data": "Hello there"}"#)
            .expect("Should parse");
        assert_eq!(
            msg,
            ControlMessage::Chat {
                data: "Hello there".to_string()
            }
        );
    }

    #[test]
    fn test_parse_unknown_type_is_accepted() {
        let msg = ControlMessage::parse(r#"{"type": "screen_share", "enabled": true}"#)
            .expect("Should parse");
        assert_eq!(msg, ControlMessage::Unrecognized);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(ControlMessage::parse("not json").is_err());
        assert!(ControlMessage::parse(r#"{"data": "missing type"}"#).is_err());
        assert!(ControlMessage::parse(r#"{"type": "chat"}"#).is_err());
    }

    #[test]
    fn test_validate_size() {
        let ok = ControlMessage::Chat {
            data: "a".repeat(MAX_CHAT_TEXT_SIZE),
        };
        assert!(ok.validate_size().is_ok());

        let too_large = ControlMessage::Chat {
            data: "a".repeat(MAX_CHAT_TEXT_SIZE + 1),
        };
        match too_large.validate_size().unwrap_err() {
            ControlValidationError::TextTooLarge { size, max } => {
                assert_eq!(size, MAX_CHAT_TEXT_SIZE + 1);
                assert_eq!(max, MAX_CHAT_TEXT_SIZE);
            }
        }
    }

    #[test]
    fn test_chat_notification_serialization() {
        let msg = PeerNotification::Chat {
            message: "Hi".to_string(),
            id: "abc".to_string(),
            role: TurnRole::Avatar,
        };
        let json = serde_json::to_string(&msg).expect("Should serialize");
        assert!(json.contains(r#""type":"chat""#));
        assert!(json.contains(r#""message":"Hi""#));
        assert!(json.contains(r#""id":"abc""#));
        assert!(json.contains(r#""role":"avatar""#));
    }

    #[test]
    fn test_avatar_end_serialization() {
        let json = serde_json::to_string(&PeerNotification::AvatarEnd).expect("Should serialize");
        assert_eq!(json, r#"{"type":"avatar_end"}"#);
    }

    #[test]
    fn test_turn_role_from_data_type() {
        assert_eq!(TurnRole::from(ChatDataType::HumanText), TurnRole::Human);
        assert_eq!(TurnRole::from(ChatDataType::AvatarText), TurnRole::Avatar);
    }

    #[test]
    fn test_turn_ids_group_consecutive_roles() {
        let mut tracker = TurnTracker::new();
        let ids: Vec<String> = [
            TurnRole::Human,
            TurnRole::Human,
            TurnRole::Avatar,
            TurnRole::Avatar,
            TurnRole::Human,
        ]
        .into_iter()
        .map(|role| tracker.assign(role))
        .collect();

        assert_eq!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_eq!(ids[2], ids[3]);
        assert_ne!(ids[3], ids[4]);
        assert_ne!(ids[0], ids[4]);
    }
}
