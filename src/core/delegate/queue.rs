//! In-memory session delegate backed by tokio channels.
//!
//! Every session gets one unbounded FIFO per channel in each direction:
//! inputs flow relay → pipeline, outputs flow pipeline → relay. Signals go
//! through a broadcast channel so a pipeline that is not subscribed yet simply
//! misses them.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, mpsc};
use tokio::time::Instant;
use tracing::debug;

use super::{SessionDelegate, SharedStates};
use crate::core::chat::{ChatData, ChatDataType, ChatPayload, ChatSignal, EngineChannel, Timestamp};

/// Signal buffer per session; slow subscribers lag rather than block emitters.
const SIGNAL_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
struct PerChannel<T> {
    audio: T,
    video: T,
    text: T,
}

impl<T> PerChannel<T> {
    fn get(&self, channel: EngineChannel) -> &T {
        match channel {
            EngineChannel::Audio => &self.audio,
            EngineChannel::Video => &self.video,
            EngineChannel::Text => &self.text,
        }
    }
}

type Queue = (
    mpsc::UnboundedSender<ChatData>,
    mpsc::UnboundedReceiver<ChatData>,
);

fn queues() -> PerChannel<Queue> {
    PerChannel {
        audio: mpsc::unbounded_channel(),
        video: mpsc::unbounded_channel(),
        text: mpsc::unbounded_channel(),
    }
}

/// Relay-side half of an in-memory session.
pub struct QueueSessionDelegate {
    session_id: String,
    timestamp_base: u32,
    started_at: Instant,
    inputs: PerChannel<mpsc::UnboundedSender<ChatData>>,
    loopback: PerChannel<mpsc::UnboundedSender<ChatData>>,
    outputs: PerChannel<Mutex<mpsc::UnboundedReceiver<ChatData>>>,
    signals: broadcast::Sender<ChatSignal>,
    shared_states: Arc<SharedStates>,
}

/// Pipeline-side half of an in-memory session.
pub struct PipelineEndpoint {
    pub session_id: String,
    pub audio_in: mpsc::UnboundedReceiver<ChatData>,
    pub video_in: mpsc::UnboundedReceiver<ChatData>,
    pub text_in: mpsc::UnboundedReceiver<ChatData>,
    pub signals: broadcast::Receiver<ChatSignal>,
    pub output: PipelineOutput,
    pub shared_states: Arc<SharedStates>,
}

/// Cloneable writer for the output queues of one session.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    audio: mpsc::UnboundedSender<ChatData>,
    video: mpsc::UnboundedSender<ChatData>,
    text: mpsc::UnboundedSender<ChatData>,
}

impl PipelineOutput {
    /// Queues `data` on the output channel matching its type. Returns false
    /// once the relay side is gone.
    pub fn send(&self, data: ChatData) -> bool {
        let tx = match data.channel() {
            EngineChannel::Audio => &self.audio,
            EngineChannel::Video => &self.video,
            EngineChannel::Text => &self.text,
        };
        tx.send(data).is_ok()
    }
}

impl QueueSessionDelegate {
    /// Creates both halves of a session whose timestamps count `timestamp_base` units per second.
    pub fn new(
        session_id: impl Into<String>,
        timestamp_base: u32,
    ) -> (Arc<Self>, PipelineEndpoint) {
        let session_id = session_id.into();
        let input = queues();
        let output = queues();
        let (signals, signal_rx) = broadcast::channel(SIGNAL_CHANNEL_CAPACITY);
        let shared_states = Arc::new(SharedStates::default());

        let pipeline_output = PipelineOutput {
            audio: output.audio.0.clone(),
            video: output.video.0.clone(),
            text: output.text.0.clone(),
        };

        let delegate = Arc::new(Self {
            session_id: session_id.clone(),
            timestamp_base,
            started_at: Instant::now(),
            inputs: PerChannel {
                audio: input.audio.0,
                video: input.video.0,
                text: input.text.0,
            },
            loopback: PerChannel {
                audio: output.audio.0,
                video: output.video.0,
                text: output.text.0,
            },
            outputs: PerChannel {
                audio: Mutex::new(output.audio.1),
                video: Mutex::new(output.video.1),
                text: Mutex::new(output.text.1),
            },
            signals,
            shared_states: shared_states.clone(),
        });

        let endpoint = PipelineEndpoint {
            session_id,
            audio_in: input.audio.1,
            video_in: input.video.1,
            text_in: input.text.1,
            signals: signal_rx,
            output: pipeline_output,
            shared_states,
        };

        (delegate, endpoint)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Additional signal subscriber, e.g. for observers next to the pipeline.
    pub fn subscribe_signals(&self) -> broadcast::Receiver<ChatSignal> {
        self.signals.subscribe()
    }
}

#[async_trait]
impl SessionDelegate for QueueSessionDelegate {
    async fn get_data(&self, channel: EngineChannel) -> Option<ChatData> {
        let mut rx = self.outputs.get(channel).lock().await;
        rx.recv().await
    }

    fn put_data(
        &self,
        channel: EngineChannel,
        payload: ChatPayload,
        timestamp: Option<Timestamp>,
        rate: Option<u32>,
        loopback: bool,
    ) {
        let timestamp = timestamp.unwrap_or_else(|| self.get_timestamp());
        let timestamp = match rate {
            Some(rate) => timestamp.rescale(rate),
            None => timestamp,
        };
        let data = ChatData::new(ChatDataType::human(channel), payload, Some(timestamp));

        if loopback && self.loopback.get(channel).send(data.clone()).is_err() {
            debug!(session_id = %self.session_id, %channel, "Loopback queue closed, dropping echo");
        }
        if self.inputs.get(channel).send(data).is_err() {
            debug!(session_id = %self.session_id, %channel, "Pipeline input closed, dropping data");
        }
    }

    fn get_timestamp(&self) -> Timestamp {
        let elapsed = self.started_at.elapsed();
        let numerator = elapsed.as_nanos() * self.timestamp_base as u128 / 1_000_000_000;
        Timestamp::new(numerator as u64, self.timestamp_base)
    }

    fn emit_signal(&self, signal: ChatSignal) {
        if self.signals.send(signal).is_err() {
            debug!(session_id = %self.session_id, "No signal subscribers, signal dropped");
        }
    }

    async fn clear_data(&self) {
        let mut rx = self.outputs.get(EngineChannel::Audio).lock().await;
        let mut dropped = 0usize;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(session_id = %self.session_id, dropped, "Cleared stale output audio");
        }
    }

    fn shared_states(&self) -> &SharedStates {
        &self.shared_states
    }
}
