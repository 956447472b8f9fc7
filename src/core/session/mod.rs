//! Session relay core: factory, sessions and the control protocol.

pub mod control;
mod factory;
mod params;
mod stream;

pub use control::{
    ControlMessage, ControlOutcome, ControlValidationError, MAX_CHAT_TEXT_SIZE, PeerNotification,
    TurnRole, TurnTracker,
};
pub use factory::SessionFactory;
pub use params::{AudioLayout, SessionParams};
pub use stream::{PeerSender, RtcSession, SIGNAL_SOURCE_NAME, SessionState};
