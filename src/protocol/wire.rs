//! Framed wire codec for the worker's stdio pipes
//!
//! Each frame is a postcard-encoded payload behind a u32 little-endian
//! length prefix. The worker's stdin carries [`ToWorker`] frames, its stdout
//! carries [`FromWorker`] frames; stderr stays free for logs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AudioChunk, ControlEvent, VideoFrame};

/// Upper bound on a single frame payload. A full-HD BGR frame is ~6 MiB;
/// anything near this limit indicates a corrupt length prefix.
const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Frames sent from the supervisor into the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToWorker {
    /// A control event for the session event loop.
    Event(ControlEvent),
    /// An input audio chunk for the feed loop.
    Audio(AudioChunk),
}

/// Frames sent from the worker back to the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FromWorker {
    /// The engine finished loading; sent exactly once per process.
    Ready,
    /// A STOP transition completed and the inbound queues were drained.
    StopAck,
    /// A status notification for the caller.
    Event(ControlEvent),
    /// Rendered output audio.
    Audio(AudioChunk),
    /// A rendered video frame.
    Video(VideoFrame),
}

/// Wire-level failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("encode: {0}")]
    Encode(#[source] postcard::Error),

    #[error("decode: {0}")]
    Decode(#[source] postcard::Error),

    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(usize),
}

impl ProtocolError {
    /// True when the peer closed the pipe; callers treat this as shutdown
    /// rather than a fault.
    pub fn is_eof(&self) -> bool {
        matches!(self, ProtocolError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// Write one length-prefixed frame and flush it.
pub fn write_frame<W: std::io::Write, T: Serialize>(
    mut w: W,
    frame: &T,
) -> Result<(), ProtocolError> {
    let payload = postcard::to_stdvec(frame).map_err(ProtocolError::Encode)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(payload.len()));
    }
    let len = payload.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&payload)?;
    w.flush()?;
    Ok(())
}

/// Read one length-prefixed frame.
pub fn read_frame<R: std::io::Read, T: for<'de> Deserialize<'de>>(
    mut r: R,
) -> Result<T, ProtocolError> {
    let mut len_bytes = [0u8; 4];
    r.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    postcard::from_bytes(&payload).map_err(ProtocolError::Decode)
}
