//! Session event loop
//!
//! A dedicated control thread that consumes control events and drives the
//! session state machine: at most one active session per worker process, the
//! output adapter registered exactly while a session is active, and the
//! inbound queues drained only as part of the STOP transition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::engine::AvatarEngine;
use crate::protocol::{AudioChunk, ControlEvent, FromWorker};
use crate::transport::MediaQueue;

use super::{audio_feed, output::ChannelOutputHandler};

pub(crate) struct SessionLoop {
    engine: Arc<dyn AvatarEngine>,
    event_in: Arc<MediaQueue<ControlEvent>>,
    audio_in: Arc<MediaQueue<AudioChunk>>,
    out_tx: Sender<FromWorker>,
    active: Arc<AtomicBool>,
    feed_handle: Option<std::thread::JoinHandle<()>>,
}

impl SessionLoop {
    pub(crate) fn new(
        engine: Arc<dyn AvatarEngine>,
        event_in: Arc<MediaQueue<ControlEvent>>,
        audio_in: Arc<MediaQueue<AudioChunk>>,
        out_tx: Sender<FromWorker>,
    ) -> Self {
        Self {
            engine,
            event_in,
            audio_in,
            out_tx,
            active: Arc::new(AtomicBool::new(false)),
            feed_handle: None,
        }
    }

    /// Consume control events until the channel disconnects at process
    /// teardown. Never exits on its own.
    pub(crate) fn run(mut self) {
        let event_rx: Receiver<ControlEvent> = self.event_in.receiver();
        loop {
            match event_rx.recv() {
                Ok(event) => {
                    tracing::info!(?event, "received control event");
                    self.handle_event(event);
                }
                Err(_) => {
                    tracing::info!("control channel closed, session loop exiting");
                    break;
                }
            }
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn handle_event(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::Start => {
                if self.is_active() {
                    tracing::warn!("received START but session is already active, ignoring");
                } else {
                    self.start_session();
                }
            }
            ControlEvent::Stop => {
                if self.is_active() {
                    self.stop_session();
                } else {
                    tracing::warn!("received STOP but no session is active, ignoring");
                }
            }
            other => {
                // Status notifications only flow outward; one showing up on
                // the inbound channel is harmless.
                tracing::debug!(?other, "ignoring status event on control-in");
            }
        }
    }

    fn start_session(&mut self) {
        let handler = Arc::new(ChannelOutputHandler::new(self.out_tx.clone()));
        self.engine.register_output_handler(handler);
        if let Err(e) = self.engine.start() {
            tracing::error!("engine failed to start: {e}");
            self.engine.clear_output_handlers();
            return;
        }
        self.active.store(true, Ordering::SeqCst);

        let engine = Arc::clone(&self.engine);
        let audio_rx = self.audio_in.receiver();
        let active = Arc::clone(&self.active);
        let handle = std::thread::Builder::new()
            .name("facecast-audio-feed".to_string())
            .spawn(move || audio_feed::run(engine, audio_rx, active));
        match handle {
            Ok(handle) => self.feed_handle = Some(handle),
            Err(e) => {
                // Without a feed thread the session cannot consume audio;
                // roll the whole transition back.
                tracing::error!("failed to spawn audio feed thread: {e}");
                self.active.store(false, Ordering::SeqCst);
                let _ = self.engine.stop();
                self.engine.clear_output_handlers();
                return;
            }
        }
        tracing::info!("avatar session started");
    }

    fn stop_session(&mut self) {
        self.active.store(false, Ordering::SeqCst);

        if let Err(e) = self.engine.stop() {
            tracing::warn!("engine stop reported: {e}");
        }
        self.engine.clear_output_handlers();

        if let Some(handle) = self.feed_handle.take() {
            if handle.join().is_err() {
                tracing::error!("audio feed thread panicked");
            }
        }

        let dropped_events = self.event_in.drain();
        let dropped_audio = self.audio_in.drain();
        if dropped_events + dropped_audio > 0 {
            tracing::debug!(dropped_events, dropped_audio, "drained inbound queues");
        }

        tracing::info!("avatar session stopped");
        let _ = self.out_tx.send(FromWorker::StopAck);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineError, EngineOutputHandler};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct ScriptedEngine {
        calls: Mutex<Vec<String>>,
        handlers: Mutex<usize>,
    }

    impl ScriptedEngine {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    impl AvatarEngine for ScriptedEngine {
        fn register_output_handler(&self, _handler: Arc<dyn EngineOutputHandler>) {
            *self.handlers.lock() += 1;
            self.calls.lock().push("register".into());
        }

        fn clear_output_handlers(&self) {
            *self.handlers.lock() = 0;
            self.calls.lock().push("clear".into());
        }

        fn start(&self) -> Result<(), EngineError> {
            self.calls.lock().push("start".into());
            Ok(())
        }

        fn stop(&self) -> Result<(), EngineError> {
            self.calls.lock().push("stop".into());
            Ok(())
        }

        fn add_audio(&self, _chunk: AudioChunk) -> Result<(), EngineError> {
            self.calls.lock().push("add_audio".into());
            Ok(())
        }
    }

    struct Harness {
        engine: Arc<ScriptedEngine>,
        session: SessionLoop,
        event_in: Arc<MediaQueue<ControlEvent>>,
        audio_in: Arc<MediaQueue<AudioChunk>>,
        out_rx: Receiver<FromWorker>,
    }

    fn harness() -> Harness {
        let engine = Arc::new(ScriptedEngine::default());
        let event_in = Arc::new(MediaQueue::unbounded());
        let audio_in = Arc::new(MediaQueue::unbounded());
        let (out_tx, out_rx) = crossbeam_channel::unbounded();
        let session = SessionLoop::new(
            engine.clone(),
            Arc::clone(&event_in),
            Arc::clone(&audio_in),
            out_tx,
        );
        Harness {
            engine,
            session,
            event_in,
            audio_in,
            out_rx,
        }
    }

    fn wait_for_call(engine: &ScriptedEngine, call: &str, count: usize) {
        for _ in 0..100 {
            if engine.calls().iter().filter(|c| *c == call).count() >= count {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        panic!("never saw {count} '{call}' calls; got {:?}", engine.calls());
    }

    #[test]
    fn test_start_registers_handler_and_activates() {
        let mut h = harness();
        h.session.handle_event(ControlEvent::Start);
        assert!(h.session.is_active());
        assert_eq!(*h.engine.handlers.lock(), 1);
        assert_eq!(h.engine.calls()[..2], ["register", "start"]);
        h.session.handle_event(ControlEvent::Stop);
    }

    #[test]
    fn test_start_while_active_is_ignored() {
        let mut h = harness();
        h.session.handle_event(ControlEvent::Start);
        h.session.handle_event(ControlEvent::Start);
        // Exactly one registered handler and one engine start.
        assert_eq!(*h.engine.handlers.lock(), 1);
        assert_eq!(
            h.engine.calls().iter().filter(|c| *c == "start").count(),
            1
        );
        h.session.handle_event(ControlEvent::Stop);
    }

    #[test]
    fn test_stop_while_inactive_is_a_noop() {
        let mut h = harness();
        h.event_in.push(ControlEvent::SpeakingToListening);
        h.audio_in.push(AudioChunk::new(vec![0.0; 8]));
        h.session.handle_event(ControlEvent::Stop);

        assert!(h.engine.calls().is_empty());
        // No drain happened: queued values are still there.
        assert_eq!(h.event_in.len(), 1);
        assert_eq!(h.audio_in.len(), 1);
        assert!(h.out_rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_drains_and_acknowledges() {
        let mut h = harness();
        h.session.handle_event(ControlEvent::Start);
        h.audio_in.push(AudioChunk::new(vec![0.0; 8]));
        wait_for_call(&h.engine, "add_audio", 1);

        h.audio_in.push(AudioChunk::new(vec![0.0; 8]));
        h.event_in.push(ControlEvent::SpeakingToListening);
        // Stop before the feed loop necessarily consumed the second chunk;
        // either way the queues must be empty afterwards.
        h.session.handle_event(ControlEvent::Stop);

        assert!(!h.session.is_active());
        assert!(h.event_in.is_empty());
        assert!(h.audio_in.is_empty());
        assert_eq!(*h.engine.handlers.lock(), 0);
        assert_eq!(h.out_rx.try_recv().unwrap(), FromWorker::StopAck);
    }

    #[test]
    fn test_session_restart_cycles_cleanly() {
        let mut h = harness();
        h.session.handle_event(ControlEvent::Start);
        h.session.handle_event(ControlEvent::Stop);
        h.session.handle_event(ControlEvent::Start);
        assert!(h.session.is_active());
        assert_eq!(*h.engine.handlers.lock(), 1);
        h.session.handle_event(ControlEvent::Stop);
        assert_eq!(
            h.engine.calls().iter().filter(|c| *c == "stop").count(),
            2
        );
    }

    #[test]
    fn test_three_chunks_reach_the_engine() {
        let mut h = harness();
        h.session.handle_event(ControlEvent::Start);
        for _ in 0..3 {
            h.audio_in.push(AudioChunk::new(vec![0.1; 240]));
        }
        wait_for_call(&h.engine, "add_audio", 3);
        h.session.handle_event(ControlEvent::Stop);
        assert_eq!(
            h.engine.calls().iter().filter(|c| *c == "add_audio").count(),
            3
        );
    }

    #[test]
    fn test_status_events_inbound_are_ignored() {
        let mut h = harness();
        h.session.handle_event(ControlEvent::SpeakingToListening);
        h.session.handle_event(ControlEvent::ListeningToSpeaking);
        assert!(h.engine.calls().is_empty());
        assert!(!h.session.is_active());
    }
}
