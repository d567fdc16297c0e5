//! Built-in synthetic renderer
//!
//! Stands in for a real avatar model: every audio chunk becomes one
//! utterance, echoed back as output audio and rendered as flat BGR frames at
//! the configured frame rate, bracketed by Speaking/Listening status changes.
//! Deterministic, which is what the worker binary and the lifecycle tests
//! need.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::protocol::{AudioChunk, VideoFrame};

use super::{
    AudioResult, AvatarEngine, AvatarInitOptions, AvatarStatus, EngineError, EngineOutputHandler,
    VideoResult,
};

/// Frame edge length for synthesized video.
const FRAME_SIZE: u32 = 256;

struct Inner {
    handlers: Vec<Arc<dyn EngineOutputHandler>>,
    running: bool,
    utterances: u64,
}

pub struct SyntheticEngine {
    options: AvatarInitOptions,
    inner: Mutex<Inner>,
}

impl SyntheticEngine {
    pub fn load(resource_root: &Path, options: AvatarInitOptions) -> Result<Self, EngineError> {
        let avatar_dir = resource_root.join(&options.avatar_name);
        if !avatar_dir.exists() {
            // The synthetic renderer has no model to load; note the missing
            // resources and carry on.
            tracing::debug!(
                avatar = %options.avatar_name,
                dir = %avatar_dir.display(),
                "no avatar resources on disk, rendering without a model"
            );
        }
        if options.use_gpu {
            tracing::info!("synthetic renderer runs on the cpu, ignoring use_gpu");
        }
        tracing::info!(
            avatar = %options.avatar_name,
            fps = options.video_frame_rate,
            sample_rate = options.audio_sample_rate,
            "synthetic engine loaded"
        );
        Ok(Self {
            options,
            inner: Mutex::new(Inner {
                handlers: Vec::new(),
                running: false,
                utterances: 0,
            }),
        })
    }

    /// How many frames one chunk of audio covers at the configured rate.
    fn frames_for(&self, chunk: &AudioChunk) -> u32 {
        if self.options.enable_fast_mode {
            return 1;
        }
        let frames = chunk.duration_secs() * self.options.video_frame_rate as f64;
        (frames.round() as u32).max(1)
    }

    fn render_frame(&self, frame_index: u32) -> VideoFrame {
        // Flat frame whose shade tracks the frame index, so consumers can
        // tell frames apart.
        let shade = (frame_index % 256) as u8;
        VideoFrame {
            width: FRAME_SIZE,
            height: FRAME_SIZE,
            data: vec![shade; (FRAME_SIZE * FRAME_SIZE * 3) as usize],
        }
    }
}

impl AvatarEngine for SyntheticEngine {
    fn register_output_handler(&self, handler: Arc<dyn EngineOutputHandler>) {
        self.inner.lock().handlers.push(handler);
    }

    fn clear_output_handlers(&self) {
        self.inner.lock().handlers.clear();
    }

    fn start(&self) -> Result<(), EngineError> {
        let handlers = {
            let mut inner = self.inner.lock();
            if inner.running {
                return Err(EngineError::AlreadyRunning);
            }
            inner.running = true;
            inner.handlers.clone()
        };
        for handler in &handlers {
            handler.on_start(&self.options);
        }
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        let handlers = {
            let mut inner = self.inner.lock();
            if !inner.running {
                return Err(EngineError::NotRunning);
            }
            inner.running = false;
            inner.handlers.clone()
        };
        for handler in &handlers {
            handler.on_stop();
        }
        Ok(())
    }

    fn add_audio(&self, chunk: AudioChunk) -> Result<(), EngineError> {
        let (handlers, utterance) = {
            let mut inner = self.inner.lock();
            if !inner.running {
                return Err(EngineError::NotRunning);
            }
            inner.utterances += 1;
            (inner.handlers.clone(), inner.utterances)
        };

        let speech_id = uuid::Uuid::new_v4().to_string();
        if self.options.debug {
            tracing::debug!(%speech_id, utterance, samples = chunk.samples.len(), "rendering utterance");
        }

        let frames = self.frames_for(&chunk);
        for handler in &handlers {
            handler.on_status_change(&speech_id, AvatarStatus::Speaking);
            handler.on_audio(AudioResult {
                speech_id: speech_id.clone(),
                chunk: chunk.clone(),
            });
            for index in 0..frames {
                handler.on_video(VideoResult {
                    speech_id: speech_id.clone(),
                    frame: self.render_frame(index),
                });
            }
            handler.on_status_change(&speech_id, AvatarStatus::Listening);
        }
        Ok(())
    }
}
