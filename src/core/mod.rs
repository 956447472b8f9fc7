pub mod chat;
pub mod delegate;
pub mod error;
pub mod metrics;
pub mod session;

// Re-export commonly used types for convenience
pub use chat::{
    AudioFrame, ChatData, ChatDataType, ChatPayload, ChatSignal, ChatSignalSourceType,
    ChatSignalType, EngineChannel, Timestamp, VideoFrame,
};

pub use delegate::{
    HandlerDelegate, LoopbackHandler, PipelineEndpoint, PipelineOutput, QueueSessionDelegate,
    SessionDelegate, SharedSessionDelegate, SharedStates,
};

pub use error::{RelayError, RelayResult};

pub use metrics::IntervalCounter;

pub use session::{
    AudioLayout, ControlMessage, ControlOutcome, PeerNotification, RtcSession, SessionFactory,
    SessionParams, SessionState, TurnRole, TurnTracker,
};
