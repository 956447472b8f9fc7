//! Interfaces to the conversational pipeline.
//!
//! The relay never sees recognition, generation or synthesis. It talks to the
//! pipeline through two narrow contracts:
//!
//! - [`HandlerDelegate`] starts and stops the pipeline for a session.
//! - [`SessionDelegate`] is the per-session surface: data queues, the
//!   timestamp source, signal emission and the shared session flags.
//!
//! [`QueueSessionDelegate`] and [`LoopbackHandler`] are in-memory
//! implementations used by the server binary and the tests.

mod loopback;
mod queue;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::chat::{ChatData, ChatPayload, ChatSignal, EngineChannel, Timestamp};
use crate::core::error::RelayResult;

pub use loopback::LoopbackHandler;
pub use queue::{PipelineEndpoint, PipelineOutput, QueueSessionDelegate};

/// Mutable flags visible to both the relay and the pipeline of one session.
#[derive(Debug)]
pub struct SharedStates {
    enable_vad: AtomicBool,
}

impl Default for SharedStates {
    fn default() -> Self {
        Self {
            enable_vad: AtomicBool::new(true),
        }
    }
}

impl SharedStates {
    pub fn enable_vad(&self) -> bool {
        self.enable_vad.load(Ordering::Acquire)
    }

    pub fn set_enable_vad(&self, enabled: bool) {
        self.enable_vad.store(enabled, Ordering::Release);
    }

    /// Clears `enable_vad`, returning whether it was set.
    pub fn take_enable_vad(&self) -> bool {
        self.enable_vad.swap(false, Ordering::AcqRel)
    }
}

/// Per-session surface of the pipeline.
#[async_trait]
pub trait SessionDelegate: Send + Sync {
    /// Waits for the next output item on `channel`. `None` means the queue is closed.
    async fn get_data(&self, channel: EngineChannel) -> Option<ChatData>;

    /// Hands an input item to the pipeline. With `loopback` the item is also
    /// echoed onto the output queue of the same channel.
    fn put_data(
        &self,
        channel: EngineChannel,
        payload: ChatPayload,
        timestamp: Option<Timestamp>,
        rate: Option<u32>,
        loopback: bool,
    );

    /// Current position of the session stream.
    fn get_timestamp(&self) -> Timestamp;

    /// Fire-and-forget control signal.
    fn emit_signal(&self, signal: ChatSignal);

    /// Drops any output audio queued so far.
    async fn clear_data(&self);

    fn shared_states(&self) -> &SharedStates;
}

/// Shared handle to a session delegate.
pub type SharedSessionDelegate = Arc<dyn SessionDelegate>;

/// Owner of the downstream pipeline.
#[async_trait]
pub trait HandlerDelegate: Send + Sync {
    /// Starts the pipeline for `session_id`. `timestamp_base` is the unit of
    /// the timestamps the delegate will report.
    async fn start_session(
        &self,
        session_id: &str,
        timestamp_base: u32,
    ) -> RelayResult<SharedSessionDelegate>;

    /// Stops the pipeline for `session_id`.
    async fn stop_session(&self, session_id: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_states_default_enables_vad() {
        let states = SharedStates::default();
        assert!(states.enable_vad());
    }

    #[test]
    fn test_take_enable_vad_is_one_shot() {
        let states = SharedStates::default();
        assert!(states.take_enable_vad());
        assert!(!states.take_enable_vad());
        assert!(!states.enable_vad());

        states.set_enable_vad(true);
        assert!(states.enable_vad());
    }
}
