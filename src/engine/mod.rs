//! Engine boundary
//!
//! The rendering engine itself is an external collaborator; this module pins
//! down the capability set the session machinery consumes and provides the
//! built-in synthetic implementation.

pub mod synthetic;

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{AudioChunk, VideoFrame};

pub use synthetic::SyntheticEngine;

/// Which rendering algorithm to load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Deterministic built-in renderer: echoes audio and synthesizes flat
    /// frames. Used when no real avatar model is wired in.
    #[default]
    Synthetic,
}

/// Construction-time options for the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvatarInitOptions {
    /// Input/output audio sample rate in Hz.
    pub audio_sample_rate: u32,

    /// Target output frame rate.
    pub video_frame_rate: u32,

    /// Which avatar identity to load from the resource root.
    pub avatar_name: String,

    /// Extra diagnostics from the engine.
    pub debug: bool,

    /// Trade rendering quality for latency.
    pub enable_fast_mode: bool,

    /// Render on the GPU when the algorithm supports it.
    pub use_gpu: bool,
}

/// Whether the avatar is waiting for speech or producing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarStatus {
    Listening,
    Speaking,
}

/// Output audio produced for one utterance.
#[derive(Debug, Clone)]
pub struct AudioResult {
    /// Identifies the utterance this audio belongs to.
    pub speech_id: String,
    pub chunk: AudioChunk,
}

/// One rendered frame for an utterance.
#[derive(Debug, Clone)]
pub struct VideoResult {
    pub speech_id: String,
    pub frame: VideoFrame,
}

/// Engine failures.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("avatar resources not found: {0}")]
    ResourcesNotFound(String),

    #[error("engine error: {0}")]
    Internal(String),
}

/// Callback set the engine pushes results through.
///
/// A handler is registered for the lifetime of one session and swapped out
/// wholesale, never mutated in place. The engine may invoke it from its own
/// rendering threads.
pub trait EngineOutputHandler: Send + Sync {
    fn on_start(&self, options: &AvatarInitOptions);

    fn on_stop(&self);

    fn on_audio(&self, result: AudioResult);

    fn on_video(&self, result: VideoResult);

    fn on_status_change(&self, speech_id: &str, status: AvatarStatus);
}

/// Capability set the session machinery drives the renderer through.
///
/// Implementations synchronize internally; the session event loop and the
/// audio feed loop call into the same instance from different threads.
pub trait AvatarEngine: Send + Sync {
    fn register_output_handler(&self, handler: Arc<dyn EngineOutputHandler>);

    fn clear_output_handlers(&self);

    fn start(&self) -> Result<(), EngineError>;

    fn stop(&self) -> Result<(), EngineError>;

    fn add_audio(&self, chunk: AudioChunk) -> Result<(), EngineError>;
}

/// Load an engine of the requested kind.
pub fn create_engine(
    resource_root: &Path,
    kind: EngineKind,
    options: AvatarInitOptions,
) -> Result<Arc<dyn AvatarEngine>, EngineError> {
    match kind {
        EngineKind::Synthetic => Ok(Arc::new(SyntheticEngine::load(resource_root, options)?)),
    }
}
