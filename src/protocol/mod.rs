//! Session protocol types
//!
//! Defines the control events and media payloads exchanged between the
//! supervisor and the worker process, plus the framed wire codec.

pub mod wire;

use serde::{Deserialize, Serialize};

pub use wire::{read_frame, write_frame, FromWorker, ProtocolError, ToWorker};

/// Audio sample rate the engine is constructed with, in Hz.
pub const AUDIO_SAMPLE_RATE: u32 = 24_000;

/// Control events flowing between the caller and the worker.
///
/// `Start` and `Stop` are commands (caller → worker); the transition events
/// are status notifications (worker → caller).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEvent {
    /// Begin a new session.
    Start,
    /// End the active session.
    Stop,
    /// The avatar went from listening to speaking.
    ListeningToSpeaking,
    /// The avatar went from speaking back to listening.
    SpeakingToListening,
}

/// A chunk of mono audio samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioChunk {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Interleaved samples, normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
}

impl AudioChunk {
    /// Create a chunk at the engine's fixed sample rate.
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            sample_rate: AUDIO_SAMPLE_RATE,
            samples,
        }
    }

    /// Duration of the chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// One rendered video frame.
///
/// Pixel data is interleaved 3-channel BGR, row-major, so
/// `data.len() == width * height * 3`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFrame {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Raw BGR24 pixel data.
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Expected byte length of `data` for the frame dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_duration() {
        let chunk = AudioChunk::new(vec![0.0; 12_000]);
        assert_eq!(chunk.sample_rate, AUDIO_SAMPLE_RATE);
        assert!((chunk.duration_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_frame_expected_len() {
        let frame = VideoFrame {
            width: 4,
            height: 2,
            data: vec![0; 24],
        };
        assert_eq!(frame.expected_len(), frame.data.len());
    }
}
