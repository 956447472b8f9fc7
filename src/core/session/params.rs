use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Channel layout the transport delivers inbound audio in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioLayout {
    #[default]
    Mono,
    Stereo,
}

impl AudioLayout {
    pub fn channels(&self) -> u16 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }
}

impl FromStr for AudioLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mono" => Ok(Self::Mono),
            "stereo" => Ok(Self::Stereo),
            other => Err(format!(
                "Invalid audio layout '{other}'. Expected 'mono' or 'stereo'"
            )),
        }
    }
}

impl fmt::Display for AudioLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mono => f.write_str("mono"),
            Self::Stereo => f.write_str("stereo"),
        }
    }
}

/// Transport parameters negotiated for every session a factory creates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionParams {
    pub expected_layout: AudioLayout,
    /// Inbound audio rate; also the timestamp base handed to the pipeline
    pub input_sample_rate: u32,
    /// Rate stamped on emitted audio
    pub output_sample_rate: u32,
    /// Samples per outbound audio frame on the wire
    pub output_frame_size: usize,
    /// Inbound video rate
    pub fps: u32,
    /// Start gate in seconds; earlier frames and control messages are dropped
    pub stream_start_delay: f64,
}

impl Default for SessionParams {
    fn default() -> Self {
        Self {
            expected_layout: AudioLayout::Mono,
            input_sample_rate: 16000,
            output_sample_rate: 24000,
            output_frame_size: 480,
            fps: 30,
            stream_start_delay: 0.5,
        }
    }
}
