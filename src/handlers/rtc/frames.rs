//! Binary media frames carried over the relay socket.
//!
//! Every binary message starts with a one byte tag:
//!
//! | tag    | body                                                   |
//! |--------|--------------------------------------------------------|
//! | `0x01` | PCM 16-bit little-endian samples                       |
//! | `0x02` | `u16` width, `u16` height (LE), then `width*height*3` RGB24 bytes |

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::core::{AudioFrame, VideoFrame};

pub const AUDIO_FRAME_TAG: u8 = 0x01;
pub const VIDEO_FRAME_TAG: u8 = 0x02;

const VIDEO_HEADER_LEN: usize = 4;
const RGB_BYTES_PER_PIXEL: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("Empty binary frame")]
    Empty,

    #[error("Unknown frame tag: 0x{0:02x}")]
    UnknownTag(u8),

    #[error("Audio payload has odd length {0}")]
    OddAudioLength(usize),

    #[error("Video frame header truncated: {0} bytes")]
    TruncatedHeader(usize),

    #[error("Video payload is {actual} bytes, expected {expected} for {width}x{height}")]
    VideoSizeMismatch {
        width: u16,
        height: u16,
        expected: usize,
        actual: usize,
    },
}

/// Decoded inbound media frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Audio(AudioFrame),
    Video(VideoFrame),
}

/// Decodes one binary message.
///
/// Audio is stamped with `sample_rate` and `channels`; samples stay interleaved.
pub fn decode_frame(data: &Bytes, sample_rate: u32, channels: u16) -> Result<InboundFrame, FrameError> {
    let (&tag, body) = data.split_first().ok_or(FrameError::Empty)?;
    match tag {
        AUDIO_FRAME_TAG => {
            if body.len() % 2 != 0 {
                return Err(FrameError::OddAudioLength(body.len()));
            }
            let samples = body
                .chunks_exact(2)
                .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            Ok(InboundFrame::Audio(AudioFrame::new(sample_rate, channels, samples)))
        }
        VIDEO_FRAME_TAG => {
            if body.len() < VIDEO_HEADER_LEN {
                return Err(FrameError::TruncatedHeader(body.len()));
            }
            let width = u16::from_le_bytes([body[0], body[1]]);
            let height = u16::from_le_bytes([body[2], body[3]]);
            let expected = width as usize * height as usize * RGB_BYTES_PER_PIXEL;
            let actual = body.len() - VIDEO_HEADER_LEN;
            if actual != expected {
                return Err(FrameError::VideoSizeMismatch {
                    width,
                    height,
                    expected,
                    actual,
                });
            }
            // Slice the original buffer so pixel data is not copied
            let pixels = data.slice(1 + VIDEO_HEADER_LEN..);
            Ok(InboundFrame::Video(VideoFrame::new(width, height, pixels)))
        }
        other => Err(FrameError::UnknownTag(other)),
    }
}

/// Encodes outbound audio samples as a tagged binary message.
pub fn encode_audio(samples: &[i16]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + samples.len() * 2);
    buf.put_u8(AUDIO_FRAME_TAG);
    for sample in samples {
        buf.put_i16_le(*sample);
    }
    buf.freeze()
}

/// Encodes an outbound video frame as a tagged binary message.
pub fn encode_video(frame: &VideoFrame) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + VIDEO_HEADER_LEN + frame.data.len());
    buf.put_u8(VIDEO_FRAME_TAG);
    buf.put_u16_le(frame.width);
    buf.put_u16_le(frame.height);
    buf.put_slice(&frame.data);
    buf.freeze()
}
