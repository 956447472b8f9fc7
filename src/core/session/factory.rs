//! Session factory and registry.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::params::SessionParams;
use super::stream::RtcSession;
use crate::core::delegate::HandlerDelegate;
use crate::core::error::{RelayError, RelayResult};

/// State shared between a factory and the weak back-references its sessions hold.
pub(crate) struct FactoryShared {
    handler: Arc<dyn HandlerDelegate>,
    params: SessionParams,
    sessions: DashMap<String, Arc<RtcSession>>,
    creation_lock: Mutex<()>,
}

impl FactoryShared {
    /// Removes `session_id` from the registry and stops its pipeline.
    ///
    /// Holds the creation lock until the pipeline acknowledged the stop, so the
    /// id cannot be reused while the old pipeline is still tearing down.
    pub(crate) async fn release(&self, session_id: &str) {
        let _creation = self.creation_lock.lock().await;
        if self.sessions.remove(session_id).is_none() {
            debug!(session_id, "Released session was not registered");
        }
        self.handler.stop_session(session_id).await;
    }
}

/// Creates sessions and owns the registry keyed by session id.
///
/// Cloning is cheap; clones share one registry. Call [`SessionFactory::shutdown`]
/// to tear every session down; sessions outliving their factory only shut down
/// locally.
#[derive(Clone)]
pub struct SessionFactory {
    shared: Arc<FactoryShared>,
}

impl SessionFactory {
    pub fn new(handler: Arc<dyn HandlerDelegate>, params: SessionParams) -> Self {
        Self {
            shared: Arc::new(FactoryShared {
                handler,
                params,
                sessions: DashMap::new(),
                creation_lock: Mutex::new(()),
            }),
        }
    }

    pub fn params(&self) -> &SessionParams {
        &self.shared.params
    }

    /// Creates, registers and starts a session.
    ///
    /// Without an id (or with an empty one) a fresh id is generated. Creations
    /// are serialized: registration and pipeline start finish before the next
    /// creation begins.
    ///
    /// # Errors
    /// - [`RelayError::DuplicateSession`] if `session_id` is already registered;
    ///   the registry is left unchanged and no pipeline is started.
    /// - Any error returned by [`HandlerDelegate::start_session`].
    pub async fn create_session(&self, session_id: Option<String>) -> RelayResult<Arc<RtcSession>> {
        let _creation = self.shared.creation_lock.lock().await;

        let session_id = session_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        if self.shared.sessions.contains_key(&session_id) {
            warn!(session_id = %session_id, "Rejecting duplicate session");
            return Err(RelayError::DuplicateSession(session_id));
        }

        let delegate = self
            .shared
            .handler
            .start_session(&session_id, self.shared.params.input_sample_rate)
            .await
            .inspect_err(|e| error!(session_id = %session_id, "Failed to create session: {}", e))?;

        let session = Arc::new(RtcSession::new(
            session_id.clone(),
            self.shared.params,
            delegate,
            Arc::downgrade(&self.shared),
        ));
        self.shared
            .sessions
            .insert(session_id.clone(), Arc::clone(&session));
        session.activate();

        info!(session_id = %session_id, "Session created");
        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<RtcSession>> {
        self.shared
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Registered session ids, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .shared
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.shared.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.sessions.is_empty()
    }

    /// Explicit stop request for one session.
    pub async fn stop_session(&self, session_id: &str) -> RelayResult<()> {
        let session = self
            .get(session_id)
            .ok_or_else(|| RelayError::SessionNotFound(session_id.to_string()))?;
        session.shutdown().await;
        Ok(())
    }

    /// Shuts down every registered session.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<RtcSession>> = self
            .shared
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let count = sessions.len();

        for session in sessions {
            session.shutdown().await;
        }

        info!(count, "Session factory shut down");
    }
}
