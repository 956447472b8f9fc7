//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check and session management endpoints
//! - `rtc` - Session relay WebSocket

pub mod api;
pub mod rtc;

pub use rtc::rtc_handler;
