//! Streaming content envelopes exchanged between the relay and the pipeline.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Independent ordered stream within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineChannel {
    Audio,
    Video,
    Text,
}

impl EngineChannel {
    /// All channels, in a stable order.
    pub const ALL: [EngineChannel; 3] = [Self::Audio, Self::Video, Self::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for EngineChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distinguishes human input from generated avatar output within a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatDataType {
    HumanAudio,
    HumanVideo,
    HumanText,
    AvatarAudio,
    AvatarVideo,
    AvatarText,
}

impl ChatDataType {
    /// Human-originated type carried on `channel`.
    pub fn human(channel: EngineChannel) -> Self {
        match channel {
            EngineChannel::Audio => Self::HumanAudio,
            EngineChannel::Video => Self::HumanVideo,
            EngineChannel::Text => Self::HumanText,
        }
    }

    /// Avatar-generated type carried on `channel`.
    pub fn avatar(channel: EngineChannel) -> Self {
        match channel {
            EngineChannel::Audio => Self::AvatarAudio,
            EngineChannel::Video => Self::AvatarVideo,
            EngineChannel::Text => Self::AvatarText,
        }
    }

    /// Channel this type travels on.
    pub fn channel(&self) -> EngineChannel {
        match self {
            Self::HumanAudio | Self::AvatarAudio => EngineChannel::Audio,
            Self::HumanVideo | Self::AvatarVideo => EngineChannel::Video,
            Self::HumanText | Self::AvatarText => EngineChannel::Text,
        }
    }

    pub fn is_human(&self) -> bool {
        matches!(self, Self::HumanAudio | Self::HumanVideo | Self::HumanText)
    }
}

/// Rational stream position: `numerator` samples (or frames) at `denominator` per second.
///
/// Gating and ordering use this instead of wall-clock time so that transport
/// jitter does not move the start gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub numerator: u64,
    pub denominator: u32,
}

impl Timestamp {
    pub fn new(numerator: u64, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Position in seconds. A zero denominator reads as the stream origin.
    pub fn as_secs_f64(&self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        self.numerator as f64 / self.denominator as f64
    }

    /// Same position expressed in units of `rate` per second, rounded down.
    pub fn rescale(&self, rate: u32) -> Self {
        if self.denominator == 0 {
            return Self::new(0, rate);
        }
        if self.denominator == rate {
            return *self;
        }
        let numerator = self.numerator as u128 * rate as u128 / self.denominator as u128;
        Self::new(numerator as u64, rate)
    }
}

/// One block of mono or interleaved PCM audio.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFrame {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<i16>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Duration of the frame in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }
}

/// One packed RGB24 video frame.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub width: u16,
    pub height: u16,
    pub data: Bytes,
}

impl VideoFrame {
    pub fn new(width: u16, height: u16, data: Bytes) -> Self {
        Self {
            width,
            height,
            data,
        }
    }
}

/// Payload carried by a [`ChatData`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChatPayload {
    Audio(Vec<i16>),
    Video(VideoFrame),
    Text(String),
}

impl ChatPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Audio(samples) => samples.is_empty(),
            Self::Video(frame) => frame.data.is_empty(),
            Self::Text(text) => text.is_empty(),
        }
    }

    pub fn channel(&self) -> EngineChannel {
        match self {
            Self::Audio(_) => EngineChannel::Audio,
            Self::Video(_) => EngineChannel::Video,
            Self::Text(_) => EngineChannel::Text,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// One unit of streaming content.
///
/// Produced by exactly one writer and consumed by exactly one reader; the
/// payload moves to the reader on dequeue. A `None` payload marks a heartbeat
/// entry that consumers skip.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatData {
    pub data_type: ChatDataType,
    pub data: Option<ChatPayload>,
    pub timestamp: Option<Timestamp>,
}

impl ChatData {
    pub fn new(data_type: ChatDataType, data: ChatPayload, timestamp: Option<Timestamp>) -> Self {
        Self {
            data_type,
            data: Some(data),
            timestamp,
        }
    }

    /// Payload-less entry used to keep a queue alive.
    pub fn heartbeat(data_type: ChatDataType) -> Self {
        Self {
            data_type,
            data: None,
            timestamp: None,
        }
    }

    pub fn channel(&self) -> EngineChannel {
        self.data_type.channel()
    }

    /// Takes the payload when it carries content; heartbeats and empty buffers yield `None`.
    pub fn into_content(self) -> Option<ChatPayload> {
        self.data.filter(|payload| !payload.is_empty())
    }
}
