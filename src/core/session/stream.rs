//! One bound transport connection.
//!
//! An [`RtcSession`] owns the gating and multiplexing between the transport
//! and its [`SessionDelegate`]:
//!
//! - inbound frames pass the start gate and are queued to the pipeline
//!   without further processing;
//! - outbound audio and video are pulled from the delegate one frame per call;
//! - side-channel control messages become signals and human text turns;
//! - a background task forwards transcript text to the peer.
//!
//! Every wait observes the session `quit` token so shutdown unblocks the
//! loops without producing synthetic frames.

use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::control::{
    ControlMessage, ControlOutcome, PeerNotification, TurnRole, TurnTracker,
};
use super::factory::FactoryShared;
use super::params::SessionParams;
use crate::core::chat::{
    AudioFrame, ChatDataType, ChatPayload, ChatSignal, ChatSignalType, EngineChannel, VideoFrame,
};
use crate::core::delegate::{SessionDelegate, SharedSessionDelegate};
use crate::core::metrics::IntervalCounter;

/// Source name attached to signals raised from this transport.
pub const SIGNAL_SOURCE_NAME: &str = "rtc";

/// Emitted audio is always mono.
const OUTPUT_AUDIO_CHANNELS: u16 = 1;

/// Head start given to audio before the first video frame is pulled.
const VIDEO_PRIME_DELAY: Duration = Duration::from_millis(100);

/// Sender half of the side channel to the peer.
pub type PeerSender = mpsc::Sender<PeerNotification>;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

pub struct RtcSession {
    session_id: String,
    params: SessionParams,
    delegate: RwLock<Option<SharedSessionDelegate>>,
    factory: Weak<FactoryShared>,
    peer: RwLock<Option<PeerSender>>,
    quit: CancellationToken,
    first_audio_emitted: AtomicBool,
    channel_attached: AtomicBool,
    closing: AtomicBool,
    state: Mutex<SessionState>,
    emit_counter: IntervalCounter,
}

impl fmt::Debug for RtcSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtcSession")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl RtcSession {
    pub(crate) fn new(
        session_id: String,
        params: SessionParams,
        delegate: SharedSessionDelegate,
        factory: Weak<FactoryShared>,
    ) -> Self {
        Self {
            session_id,
            params,
            delegate: RwLock::new(Some(delegate)),
            factory,
            peer: RwLock::new(None),
            quit: CancellationToken::new(),
            first_audio_emitted: AtomicBool::new(false),
            channel_attached: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            state: Mutex::new(SessionState::Created),
            emit_counter: IntervalCounter::new("emit counter"),
        }
    }

    pub(crate) fn activate(&self) {
        let mut state = self.state.lock();
        if *state == SessionState::Created {
            *state = SessionState::Active;
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Token cancelled when the session starts shutting down.
    pub fn quit_token(&self) -> CancellationToken {
        self.quit.clone()
    }

    /// Bound delegate, `None` once shutdown released it.
    pub fn delegate(&self) -> Option<SharedSessionDelegate> {
        self.delegate.read().clone()
    }

    pub fn emit_counter(&self) -> &IntervalCounter {
        &self.emit_counter
    }

    fn gate_open(&self, delegate: &dyn SessionDelegate) -> bool {
        delegate.get_timestamp().as_secs_f64() >= self.params.stream_start_delay
    }

    /// Forwards an inbound audio frame to the pipeline.
    ///
    /// Returns false when the frame was dropped by the start gate or because
    /// the session is closing.
    pub fn receive_audio(&self, frame: AudioFrame) -> bool {
        let Some(delegate) = self.delegate() else {
            return false;
        };
        let timestamp = delegate.get_timestamp();
        if timestamp.as_secs_f64() < self.params.stream_start_delay {
            return false;
        }
        delegate.put_data(
            EngineChannel::Audio,
            ChatPayload::Audio(frame.samples),
            Some(timestamp),
            Some(self.params.input_sample_rate),
            false,
        );
        true
    }

    /// Forwards an inbound video frame to the pipeline. See [`Self::receive_audio`].
    pub fn receive_video(&self, frame: VideoFrame) -> bool {
        let Some(delegate) = self.delegate() else {
            return false;
        };
        let timestamp = delegate.get_timestamp();
        if timestamp.as_secs_f64() < self.params.stream_start_delay {
            return false;
        }
        delegate.put_data(
            EngineChannel::Video,
            ChatPayload::Video(frame),
            Some(timestamp),
            Some(self.params.fps),
            false,
        );
        true
    }

    /// Waits for the next outbound audio frame.
    ///
    /// The first call drops audio queued before the transport was ready.
    /// Heartbeats and empty buffers are skipped. Returns `None` once the
    /// session quits or the delegate queue closes.
    pub async fn emit_audio(&self) -> Option<AudioFrame> {
        let delegate = self.delegate()?;

        if !self.first_audio_emitted.swap(true, Ordering::AcqRel) {
            delegate.clear_data().await;
        }

        loop {
            let data = tokio::select! {
                biased;
                _ = self.quit.cancelled() => return None,
                data = delegate.get_data(EngineChannel::Audio) => data?,
            };
            let Some(ChatPayload::Audio(samples)) = data.into_content() else {
                continue;
            };
            let frame = AudioFrame::new(
                self.params.output_sample_rate,
                OUTPUT_AUDIO_CHANNELS,
                samples,
            );
            self.emit_counter
                .add_value("audio_emit", frame.duration_secs());
            return Some(frame);
        }
    }

    /// Waits for the next outbound video frame.
    ///
    /// Until audio emission has started, the first pull is delayed briefly so
    /// the peer's audio path is primed before visual output begins.
    pub async fn emit_video(&self) -> Option<VideoFrame> {
        let delegate = self.delegate()?;

        if !self.first_audio_emitted.load(Ordering::Acquire) {
            tokio::select! {
                biased;
                _ = self.quit.cancelled() => return None,
                _ = tokio::time::sleep(VIDEO_PRIME_DELAY) => {}
            }
        }

        loop {
            let data = tokio::select! {
                biased;
                _ = self.quit.cancelled() => return None,
                data = delegate.get_data(EngineChannel::Video) => data?,
            };
            let Some(ChatPayload::Video(frame)) = data.into_content() else {
                continue;
            };
            self.emit_counter.add("video_emit");
            return Some(frame);
        }
    }

    /// Interprets one side-channel message.
    pub async fn handle_control_message(&self, raw: &str) -> ControlOutcome {
        debug!(session_id = %self.session_id, bytes = raw.len(), "Received control message");

        let message = match ControlMessage::parse(raw) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(session_id = %self.session_id, "Failed to parse control message: {}", e);
                None
            }
        };

        let Some(delegate) = self.delegate() else {
            return ControlOutcome::Detached;
        };
        if !self.gate_open(delegate.as_ref()) {
            debug!(session_id = %self.session_id, "Control message before start gate, ignoring");
            return ControlOutcome::Gated;
        }
        let Some(message) = message else {
            return ControlOutcome::Malformed;
        };
        if let Err(e) = message.validate_size() {
            warn!(session_id = %self.session_id, "Control message validation failed: {}", e);
            return ControlOutcome::Rejected;
        }

        info!(session_id = %self.session_id, message = ?message, "Control message");

        match message {
            ControlMessage::StopChat => {
                delegate.emit_signal(ChatSignal::from_client(
                    ChatSignalType::Interrupt,
                    SIGNAL_SOURCE_NAME,
                ));
                ControlOutcome::Interrupted
            }
            ControlMessage::Chat { data } => {
                self.notify_peer(PeerNotification::AvatarEnd).await;

                if !delegate.shared_states().take_enable_vad() {
                    debug!(session_id = %self.session_id, "VAD disabled, dropping duplicate chat turn");
                    return ControlOutcome::ChatSuppressed;
                }

                delegate.emit_signal(
                    ChatSignal::from_client(ChatSignalType::Begin, SIGNAL_SOURCE_NAME)
                        .with_stream_type(ChatDataType::AvatarAudio),
                );
                delegate.put_data(
                    EngineChannel::Text,
                    ChatPayload::Text(data),
                    None,
                    None,
                    true,
                );
                ControlOutcome::ChatStarted
            }
            ControlMessage::Unrecognized => ControlOutcome::Ignored,
        }
    }

    async fn notify_peer(&self, notification: PeerNotification) {
        let peer = self.peer.read().clone();
        match peer {
            Some(peer) => {
                if peer.send(notification).await.is_err() {
                    warn!(session_id = %self.session_id, "Side channel closed, notification dropped");
                }
            }
            None => debug!(session_id = %self.session_id, "No side channel attached"),
        }
    }

    /// Binds the side channel and starts forwarding transcript text to it.
    ///
    /// Only the first call binds; later calls are ignored and return `None`.
    pub fn attach_channel(self: &Arc<Self>, peer: PeerSender) -> Option<JoinHandle<()>> {
        if self.channel_attached.swap(true, Ordering::AcqRel) {
            warn!(session_id = %self.session_id, "Side channel already attached, ignoring");
            return None;
        }
        *self.peer.write() = Some(peer.clone());
        let session = Arc::clone(self);
        Some(tokio::spawn(async move {
            session.forward_transcripts(peer).await
        }))
    }

    async fn forward_transcripts(&self, peer: PeerSender) {
        let Some(delegate) = self.delegate() else {
            return;
        };
        let mut turns = TurnTracker::new();

        loop {
            let data = tokio::select! {
                biased;
                _ = self.quit.cancelled() => break,
                data = delegate.get_data(EngineChannel::Text) => match data {
                    Some(data) => data,
                    None => break,
                },
            };
            let role = TurnRole::from(data.data_type);
            let Some(ChatPayload::Text(message)) = data.into_content() else {
                continue;
            };
            debug!(session_id = %self.session_id, ?role, "Forwarding transcript");

            let id = turns.assign(role);
            if peer
                .send(PeerNotification::Chat { message, id, role })
                .await
                .is_err()
            {
                warn!(session_id = %self.session_id, "Side channel closed, stopping transcript forwarding");
                break;
            }
        }
    }

    /// Closes the session.
    ///
    /// Cancels `quit`, releases the delegate, then removes the registry entry
    /// and stops the pipeline through the owning factory. Calling it again is
    /// a no-op. If the factory is gone only the local teardown happens.
    pub async fn shutdown(&self) {
        if self.closing.swap(true, Ordering::AcqRel) {
            debug!(session_id = %self.session_id, "Session already shutting down");
            return;
        }

        *self.state.lock() = SessionState::Closing;
        self.quit.cancel();
        self.delegate.write().take();
        self.peer.write().take();

        match self.factory.upgrade() {
            Some(factory) => factory.release(&self.session_id).await,
            None => debug!(session_id = %self.session_id, "Factory gone, local shutdown only"),
        }

        *self.state.lock() = SessionState::Closed;
        info!(session_id = %self.session_id, "Session closed");
    }
}
