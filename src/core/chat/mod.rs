//! Chat data and signal model shared by the relay and the pipeline.

mod data;
mod signal;

pub use data::{
    AudioFrame, ChatData, ChatDataType, ChatPayload, EngineChannel, Timestamp, VideoFrame,
};
pub use signal::{ChatSignal, ChatSignalSourceType, ChatSignalType};
