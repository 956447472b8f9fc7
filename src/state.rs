use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::{HandlerDelegate, LoopbackHandler, SessionFactory};

/// Application state shared by every route
pub struct AppState {
    pub config: ServerConfig,
    pub sessions: SessionFactory,
}

impl AppState {
    /// State backed by the built-in loopback pipeline
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Self::with_handler(config, Arc::new(LoopbackHandler::new()))
    }

    /// State backed by an externally supplied pipeline handler
    pub fn with_handler(config: ServerConfig, handler: Arc<dyn HandlerDelegate>) -> Arc<Self> {
        let sessions = SessionFactory::new(handler, config.relay.session_params());
        Arc::new(Self { config, sessions })
    }
}
