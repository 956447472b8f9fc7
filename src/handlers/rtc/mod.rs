//! Relay WebSocket handlers
//!
//! One WebSocket carries both the media transport and the side channel of a
//! single session.
//!
//! # Protocol
//!
//! ## Client → Server
//!
//! - **Binary frames**: tagged audio (`0x01`, PCM 16-bit LE at the input rate)
//!   or video (`0x02`, RGB24 with a width/height header). See [`frames`].
//! - **stop_chat**: Interrupt the current response round
//! - **chat**: Typed human turn (`{"type": "chat", "data": "..."}`)
//!
//! ## Server → Client
//!
//! - **Binary frames**: avatar audio in `output_frame_size` sample chunks at
//!   the output rate, and avatar video frames
//! - **chat**: Transcript fragment with a turn id and a `human`/`avatar` role
//! - **avatar_end**: Stop rendering the current avatar output
//!
//! Frames and control messages arriving before the session's start delay
//! has elapsed are dropped.

pub mod frames;
mod handler;

pub use handler::{RtcQuery, rtc_handler};
