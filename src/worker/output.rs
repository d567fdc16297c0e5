//! Output adapter
//!
//! Bridges the engine's push-style result callbacks onto the outbound frame
//! channel. One adapter is constructed per session and registered with the
//! engine only while that session is active.

use crossbeam_channel::Sender;

use crate::engine::{
    AudioResult, AvatarInitOptions, AvatarStatus, EngineOutputHandler, VideoResult,
};
use crate::protocol::{ControlEvent, FromWorker};
use crate::utils::IntervalCounter;

pub(crate) struct ChannelOutputHandler {
    out_tx: Sender<FromWorker>,
    video_counter: IntervalCounter,
}

impl ChannelOutputHandler {
    pub(crate) fn new(out_tx: Sender<FromWorker>) -> Self {
        Self {
            out_tx,
            video_counter: IntervalCounter::new("video_producer"),
        }
    }

    fn forward(&self, frame: FromWorker) {
        // The outbound channel is unbounded, so this never blocks the
        // engine's rendering thread; it only fails during process teardown.
        if self.out_tx.send(frame).is_err() {
            tracing::debug!("outbound channel closed, discarding engine result");
        }
    }
}

impl EngineOutputHandler for ChannelOutputHandler {
    fn on_start(&self, options: &AvatarInitOptions) {
        tracing::info!(avatar = %options.avatar_name, "engine started");
    }

    fn on_stop(&self) {
        tracing::info!("engine stopped");
    }

    fn on_audio(&self, result: AudioResult) {
        self.forward(FromWorker::Audio(result.chunk));
    }

    fn on_video(&self, result: VideoResult) {
        self.video_counter.add();
        self.forward(FromWorker::Video(result.frame));
    }

    fn on_status_change(&self, speech_id: &str, status: AvatarStatus) {
        tracing::info!(speech_id, ?status, "avatar status changed");
        if status == AvatarStatus::Listening {
            self.forward(FromWorker::Event(ControlEvent::SpeakingToListening));
        }
    }
}
