//! Echo pipeline used when no real conversational pipeline is attached.
//!
//! Inbound audio and video come straight back as avatar output, and every
//! human text turn is answered with an avatar text turn carrying the same
//! words. After answering, the pipeline re-enables VAD for the session the
//! same way a real pipeline does at the end of a response round.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::queue::{PipelineEndpoint, QueueSessionDelegate};
use super::{HandlerDelegate, SharedSessionDelegate};
use crate::core::chat::{ChatData, ChatDataType, ChatPayload, ChatSignalType, EngineChannel};
use crate::core::error::{RelayError, RelayResult};

/// [`HandlerDelegate`] running one echo pipeline task per session.
#[derive(Debug, Default)]
pub struct LoopbackHandler {
    pipelines: DashMap<String, CancellationToken>,
}

impl LoopbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pipelines currently running.
    pub fn active_sessions(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_running(&self, session_id: &str) -> bool {
        self.pipelines.contains_key(session_id)
    }
}

#[async_trait]
impl HandlerDelegate for LoopbackHandler {
    async fn start_session(
        &self,
        session_id: &str,
        timestamp_base: u32,
    ) -> RelayResult<SharedSessionDelegate> {
        if self.pipelines.contains_key(session_id) {
            return Err(RelayError::SessionStart {
                session_id: session_id.to_string(),
                reason: "pipeline already running".to_string(),
            });
        }

        let (delegate, endpoint) = QueueSessionDelegate::new(session_id, timestamp_base);
        let token = CancellationToken::new();
        self.pipelines.insert(session_id.to_string(), token.clone());
        tokio::spawn(run_loopback(endpoint, token));

        info!(session_id, timestamp_base, "Loopback pipeline started");
        Ok(delegate as SharedSessionDelegate)
    }

    async fn stop_session(&self, session_id: &str) {
        match self.pipelines.remove(session_id) {
            Some((_, token)) => {
                token.cancel();
                info!(session_id, "Loopback pipeline stopped");
            }
            None => debug!(session_id, "Stop requested for unknown pipeline"),
        }
    }
}

/// Re-emits `data` on the output side as avatar content of the same channel.
fn echo(endpoint: &PipelineEndpoint, channel: EngineChannel, data: ChatData) {
    let timestamp = data.timestamp;
    if let Some(payload) = data.into_content() {
        endpoint.output.send(ChatData::new(
            ChatDataType::avatar(channel),
            payload,
            timestamp,
        ));
    }
}

async fn run_loopback(mut endpoint: PipelineEndpoint, token: CancellationToken) {
    let session_id = endpoint.session_id.clone();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            Some(data) = endpoint.audio_in.recv() => echo(&endpoint, EngineChannel::Audio, data),
            Some(data) = endpoint.video_in.recv() => echo(&endpoint, EngineChannel::Video, data),
            Some(data) = endpoint.text_in.recv() => {
                let timestamp = data.timestamp;
                if let Some(ChatPayload::Text(text)) = data.into_content() {
                    debug!(session_id = %session_id, "Answering text turn");
                    endpoint.output.send(ChatData::new(
                        ChatDataType::AvatarText,
                        ChatPayload::Text(text),
                        timestamp,
                    ));
                    endpoint.shared_states.set_enable_vad(true);
                }
            }
            signal = endpoint.signals.recv() => match signal {
                Ok(signal) => match signal.signal_type {
                    ChatSignalType::Begin => {
                        debug!(session_id = %session_id, stream_type = ?signal.stream_type, "Response round begins");
                    }
                    ChatSignalType::Interrupt => {
                        debug!(session_id = %session_id, source = %signal.source_name, "Response round interrupted");
                        endpoint.shared_states.set_enable_vad(true);
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(session_id = %session_id, skipped, "Loopback pipeline lagged behind signals");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!(session_id = %session_id, "Loopback pipeline finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chat::{ChatSignal, Timestamp};
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_echoes_audio_as_avatar_output() {
        let handler = LoopbackHandler::new();
        let delegate = handler.start_session("s1", 16000).await.unwrap();

        delegate.put_data(
            EngineChannel::Audio,
            ChatPayload::Audio(vec![1, 2, 3]),
            Some(Timestamp::new(16000, 16000)),
            Some(16000),
            false,
        );

        let data = timeout(Duration::from_secs(1), delegate.get_data(EngineChannel::Audio))
            .await
            .expect("echo in time")
            .expect("queue open");
        assert_eq!(data.data_type, ChatDataType::AvatarAudio);
        assert_eq!(data.data, Some(ChatPayload::Audio(vec![1, 2, 3])));
    }

    #[tokio::test]
    async fn test_text_reply_restores_vad() {
        let handler = LoopbackHandler::new();
        let delegate = handler.start_session("s1", 16000).await.unwrap();
        delegate.shared_states().set_enable_vad(false);

        delegate.put_data(
            EngineChannel::Text,
            ChatPayload::Text("hi".to_string()),
            None,
            None,
            false,
        );

        let reply = timeout(Duration::from_secs(1), delegate.get_data(EngineChannel::Text))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.data_type, ChatDataType::AvatarText);
        assert!(delegate.shared_states().enable_vad());
    }

    #[tokio::test]
    async fn test_interrupt_restores_vad() {
        let handler = LoopbackHandler::new();
        let delegate = handler.start_session("s1", 16000).await.unwrap();
        delegate.shared_states().set_enable_vad(false);

        delegate.emit_signal(ChatSignal::from_client(ChatSignalType::Interrupt, "rtc"));

        timeout(Duration::from_secs(1), async {
            while !delegate.shared_states().enable_vad() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("vad restored");
    }

    #[tokio::test]
    async fn test_duplicate_start_rejected_and_stop_is_tracked() {
        let handler = LoopbackHandler::new();
        handler.start_session("s1", 16000).await.unwrap();
        assert!(handler.is_running("s1"));

        let err = handler.start_session("s1", 16000).await.err().unwrap();
        assert!(matches!(err, RelayError::SessionStart { .. }));

        handler.stop_session("s1").await;
        assert!(!handler.is_running("s1"));
        assert_eq!(handler.active_sessions(), 0);

        // Unknown ids are ignored
        handler.stop_session("s1").await;
    }
}
