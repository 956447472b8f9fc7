//! Relay WebSocket handler
//!
//! Binds one WebSocket connection to one [`RtcSession`]. The session is
//! created before the upgrade so a duplicate id or a pipeline failure is
//! reported as a plain HTTP error instead of a dropped socket.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::core::{PeerNotification, RelayError, RtcSession};
use crate::errors::AppError;
use crate::state::AppState;

use super::frames::{InboundFrame, decode_frame, encode_audio, encode_video};

/// Channel buffer size for outbound media and notifications
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (10 MB)
const MAX_WS_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// How long the sender task may take to flush after the session closed
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct RtcQuery {
    /// Requested session id; a fresh one is generated when absent
    pub session_id: Option<String>,
}

/// Outbound traffic queued for the socket writer
#[derive(Debug)]
enum RtcMessageRoute {
    Notification(PeerNotification),
    Binary(Bytes),
    Close,
}

/// Relay WebSocket handler
///
/// # Errors
/// Answers `409 Conflict` when the session id is already registered and
/// `500 Internal Server Error` when the pipeline could not start the session.
pub async fn rtc_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<RtcQuery>,
) -> Response {
    let session = match state.sessions.create_session(query.session_id).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejecting relay connection: {}", e);
            return AppError::from(e).into_response();
        }
    };

    info!(session_id = %session.session_id(), "Relay WebSocket connection upgrade requested");

    let failed_session = Arc::clone(&session);
    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_failed_upgrade(move |e| {
            warn!(session_id = %failed_session.session_id(), "WebSocket upgrade failed: {}", e);
            tokio::spawn(async move { failed_session.shutdown().await });
        })
        .on_upgrade(move |socket| handle_rtc_socket(socket, state, session))
}

/// Handle the relay WebSocket connection
async fn handle_rtc_socket(socket: WebSocket, app_state: Arc<AppState>, session: Arc<RtcSession>) {
    let session_id = session.session_id().to_string();
    info!(session_id = %session_id, "Relay WebSocket connection established");

    let (sender, mut receiver) = socket.split();
    let (route_tx, route_rx) = mpsc::channel::<RtcMessageRoute>(CHANNEL_BUFFER_SIZE);
    let (notify_tx, notify_rx) = mpsc::channel::<PeerNotification>(CHANNEL_BUFFER_SIZE);

    // Sender task for outgoing messages
    let sender_task = tokio::spawn(run_sender(
        sender,
        route_rx,
        notify_rx,
        session_id.clone(),
        session.quit_token(),
    ));

    let transcript_task = session.attach_channel(notify_tx);
    let audio_task = spawn_audio_emitter(Arc::clone(&session), route_tx.clone());
    let video_task = spawn_video_emitter(Arc::clone(&session), route_tx.clone());

    let idle_timeout = app_state.config.relay.idle_timeout();
    let quit = session.quit_token();
    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            msg_result = receiver.next() => {
                last_activity = Instant::now();

                match msg_result {
                    Some(Ok(msg)) => {
                        if !process_rtc_message(msg, &session).await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!(session_id = %session_id, "Relay WebSocket error: {}", e);
                        break;
                    }
                    None => {
                        info!(session_id = %session_id, "Relay WebSocket connection closed by client");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(last_activity + idle_timeout) => {
                warn!(
                    session_id = %session_id,
                    "Relay WebSocket connection idle for {}s, closing stale connection",
                    last_activity.elapsed().as_secs()
                );
                break;
            }
            _ = quit.cancelled() => {
                info!(session_id = %session_id, "Session stopped, closing relay connection");
                break;
            }
        }
    }

    // Cleanup
    session.shutdown().await;

    let tasks = transcript_task
        .map(|task| ("transcript", task))
        .into_iter()
        .chain([("audio", audio_task), ("video", video_task)]);
    for (name, task) in tasks {
        if let Err(e) = task.await {
            error!(session_id = %session_id, task = name, "Relay task failed: {}", e);
        }
    }

    let _ = route_tx.send(RtcMessageRoute::Close).await;
    drop(route_tx);

    let mut sender_task = sender_task;
    match tokio::time::timeout(SENDER_DRAIN_TIMEOUT, &mut sender_task).await {
        Ok(Err(e)) => error!(session_id = %session_id, "Relay sender task failed: {}", e),
        Err(_) => {
            warn!(session_id = %session_id, "Relay sender task did not drain, aborting");
            sender_task.abort();
        }
        Ok(Ok(())) => {}
    }

    info!(session_id = %session_id, "Relay WebSocket connection terminated");
}

/// Writes queued routes to the socket until a close is sent or both queues end.
///
/// A failed write cancels the session so the read loop tears it down.
async fn run_sender<S>(
    mut sink: S,
    mut route_rx: mpsc::Receiver<RtcMessageRoute>,
    mut notify_rx: mpsc::Receiver<PeerNotification>,
    session_id: String,
    quit: CancellationToken,
) where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        let route = tokio::select! {
            Some(route) = route_rx.recv() => route,
            Some(notification) = notify_rx.recv() => RtcMessageRoute::Notification(notification),
            else => break,
        };
        let should_close = matches!(route, RtcMessageRoute::Close);

        let result = match route {
            RtcMessageRoute::Notification(notification) => {
                match serde_json::to_string(&notification) {
                    Ok(json_str) => sink.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!(session_id = %session_id, "Failed to serialize notification: {}", e);
                        continue;
                    }
                }
            }
            RtcMessageRoute::Binary(data) => sink.send(Message::Binary(data)).await,
            RtcMessageRoute::Close => sink.send(Message::Close(None)).await,
        };

        if let Err(e) = result {
            let err = RelayError::Transport(e.to_string());
            warn!(session_id = %session_id, "Relay send failed, closing session: {}", err);
            quit.cancel();
            break;
        }

        if should_close {
            break;
        }
    }
}

/// Process incoming WebSocket message
///
/// Returns false when the connection should close.
async fn process_rtc_message(msg: Message, session: &RtcSession) -> bool {
    match msg {
        Message::Binary(data) => {
            let params = session.params();
            match decode_frame(&data, params.input_sample_rate, params.expected_layout.channels()) {
                Ok(InboundFrame::Audio(frame)) => {
                    if !session.receive_audio(frame) {
                        debug!(session_id = %session.session_id(), "Audio frame dropped");
                    }
                }
                Ok(InboundFrame::Video(frame)) => {
                    if !session.receive_video(frame) {
                        debug!(session_id = %session.session_id(), "Video frame dropped");
                    }
                }
                Err(e) => {
                    warn!(session_id = %session.session_id(), "Dropping malformed binary frame: {}", e);
                }
            }
            true
        }
        Message::Text(text) => {
            let outcome = session.handle_control_message(&text).await;
            debug!(session_id = %session.session_id(), ?outcome, "Control message handled");
            true
        }
        Message::Ping(_) => {
            debug!("Received ping");
            true
        }
        Message::Pong(_) => {
            debug!("Received pong");
            true
        }
        Message::Close(_) => {
            info!(session_id = %session.session_id(), "Relay WebSocket close received");
            false
        }
    }
}

/// Pulls avatar audio and writes it in `output_frame_size` sample chunks.
fn spawn_audio_emitter(
    session: Arc<RtcSession>,
    route_tx: mpsc::Sender<RtcMessageRoute>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let frame_size = session.params().output_frame_size.max(1);
        while let Some(frame) = session.emit_audio().await {
            for chunk in frame.samples.chunks(frame_size) {
                if route_tx
                    .send(RtcMessageRoute::Binary(encode_audio(chunk)))
                    .await
                    .is_err()
                {
                    return;
                }
            }
        }
        debug!(session_id = %session.session_id(), "Audio emitter finished");
    })
}

fn spawn_video_emitter(
    session: Arc<RtcSession>,
    route_tx: mpsc::Sender<RtcMessageRoute>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = session.emit_video().await {
            if route_tx
                .send(RtcMessageRoute::Binary(encode_video(&frame)))
                .await
                .is_err()
            {
                return;
            }
        }
        debug!(session_id = %session.session_id(), "Video emitter finished");
    })
}
