//! Recording pipeline doubles shared by the integration tests.

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use avatar_relay::{
    ChatData, ChatPayload, ChatSignal, EngineChannel, HandlerDelegate, RelayError, RelayResult,
    SessionDelegate, SharedSessionDelegate, SharedStates, Timestamp,
};

/// One recorded `put_data` call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPut {
    pub channel: EngineChannel,
    pub payload: ChatPayload,
    pub timestamp: Option<Timestamp>,
    pub rate: Option<u32>,
    pub loopback: bool,
}

struct OutputQueue {
    tx: Mutex<Option<mpsc::UnboundedSender<ChatData>>>,
    rx: AsyncMutex<mpsc::UnboundedReceiver<ChatData>>,
}

impl OutputQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: AsyncMutex::new(rx),
        }
    }
}

/// Session delegate with a settable clock and scripted output queues.
pub struct MockSessionDelegate {
    timestamp: Mutex<Timestamp>,
    puts: Mutex<Vec<RecordedPut>>,
    signals: Mutex<Vec<ChatSignal>>,
    clear_calls: AtomicUsize,
    outputs: HashMap<EngineChannel, OutputQueue>,
    shared_states: SharedStates,
}

impl MockSessionDelegate {
    pub fn new(timestamp: Timestamp) -> Arc<Self> {
        Arc::new(Self {
            timestamp: Mutex::new(timestamp),
            puts: Mutex::new(Vec::new()),
            signals: Mutex::new(Vec::new()),
            clear_calls: AtomicUsize::new(0),
            outputs: EngineChannel::ALL
                .iter()
                .map(|channel| (*channel, OutputQueue::new()))
                .collect(),
            shared_states: SharedStates::default(),
        })
    }

    /// Delegate whose clock reads `secs` seconds at a 16 kHz base.
    pub fn at_secs(secs: f64) -> Arc<Self> {
        Self::new(secs_to_timestamp(secs))
    }

    pub fn set_time_secs(&self, secs: f64) {
        *self.timestamp.lock() = secs_to_timestamp(secs);
    }

    /// Queues an output item the relay will read from `channel`.
    pub fn push_output(&self, channel: EngineChannel, data: ChatData) {
        if let Some(tx) = self.outputs[&channel].tx.lock().as_ref() {
            tx.send(data).expect("output queue open");
        }
    }

    /// Closes the output queue of `channel` once its items are drained.
    pub fn close_output(&self, channel: EngineChannel) {
        self.outputs[&channel].tx.lock().take();
    }

    pub fn puts(&self) -> Vec<RecordedPut> {
        self.puts.lock().clone()
    }

    pub fn signals(&self) -> Vec<ChatSignal> {
        self.signals.lock().clone()
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }
}

fn secs_to_timestamp(secs: f64) -> Timestamp {
    Timestamp::new((secs * 16000.0).round() as u64, 16000)
}

#[async_trait]
impl SessionDelegate for MockSessionDelegate {
    async fn get_data(&self, channel: EngineChannel) -> Option<ChatData> {
        let mut rx = self.outputs[&channel].rx.lock().await;
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
        self.puts.lock().push(RecordedPut {
            channel,
            payload,
            timestamp,
            rate,
            loopback,
        });
    }

    fn get_timestamp(&self) -> Timestamp {
        *self.timestamp.lock()
    }

    fn emit_signal(&self, signal: ChatSignal) {
        self.signals.lock().push(signal);
    }

    async fn clear_data(&self) {
        let mut rx = self.outputs[&EngineChannel::Audio].rx.lock().await;
        while rx.try_recv().is_ok() {}
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn shared_states(&self) -> &SharedStates {
        &self.shared_states
    }
}

/// Handler that hands out [`MockSessionDelegate`]s and records lifecycle calls.
pub struct MockHandlerDelegate {
    start_secs: f64,
    fail_start: AtomicBool,
    started: Mutex<Vec<(String, u32)>>,
    stopped: Mutex<Vec<String>>,
    running: Mutex<HashSet<String>>,
    delegates: Mutex<HashMap<String, Arc<MockSessionDelegate>>>,
}

impl MockHandlerDelegate {
    /// Handler whose session clocks start at `start_secs`.
    pub fn new(start_secs: f64) -> Arc<Self> {
        Arc::new(Self {
            start_secs,
            fail_start: AtomicBool::new(false),
            started: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            running: Mutex::new(HashSet::new()),
            delegates: Mutex::new(HashMap::new()),
        })
    }

    pub fn fail_next_start(&self) {
        self.fail_start.store(true, Ordering::SeqCst);
    }

    pub fn started(&self) -> Vec<(String, u32)> {
        self.started.lock().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().clone()
    }

    /// Whether a pipeline is currently running under `session_id`.
    pub fn is_running(&self, session_id: &str) -> bool {
        self.running.lock().contains(session_id)
    }

    pub fn delegate(&self, session_id: &str) -> Option<Arc<MockSessionDelegate>> {
        self.delegates.lock().get(session_id).cloned()
    }
}

#[async_trait]
impl HandlerDelegate for MockHandlerDelegate {
    async fn start_session(
        &self,
        session_id: &str,
        timestamp_base: u32,
    ) -> RelayResult<SharedSessionDelegate> {
        self.started
            .lock()
            .push((session_id.to_string(), timestamp_base));

        if self.fail_start.swap(false, Ordering::SeqCst) {
            return Err(RelayError::SessionStart {
                session_id: session_id.to_string(),
                reason: "pipeline unavailable".to_string(),
            });
        }

        let delegate = MockSessionDelegate::at_secs(self.start_secs);
        self.running.lock().insert(session_id.to_string());
        self.delegates
            .lock()
            .insert(session_id.to_string(), Arc::clone(&delegate));
        Ok(delegate as SharedSessionDelegate)
    }

    async fn stop_session(&self, session_id: &str) {
        // Pipelines take a moment to acknowledge a stop
        tokio::task::yield_now().await;
        self.running.lock().remove(session_id);
        self.stopped.lock().push(session_id.to_string());
    }
}
