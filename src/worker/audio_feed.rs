//! Audio feed loop
//!
//! Runs on its own thread only while a session is active, draining the
//! inbound audio queue into the engine. The active flag is polled on a
//! 100 ms receive timeout, which bounds session-stop latency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::engine::AvatarEngine;
use crate::protocol::AudioChunk;

pub(crate) const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub(crate) fn run(
    engine: Arc<dyn AvatarEngine>,
    audio_rx: Receiver<AudioChunk>,
    active: Arc<AtomicBool>,
) {
    while active.load(Ordering::SeqCst) {
        match audio_rx.recv_timeout(RECV_TIMEOUT) {
            Ok(chunk) => {
                // Engine rejections are logged, not fatal: the session stays
                // up and later chunks still get through.
                if let Err(e) = engine.add_audio(chunk) {
                    tracing::warn!("engine rejected audio chunk: {e}");
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                tracing::warn!("audio-in channel disconnected, feed loop exiting");
                break;
            }
        }
    }
    tracing::debug!("audio feed loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use parking_lot::Mutex;
    use std::time::Instant;

    #[derive(Default)]
    struct CountingEngine {
        chunks: Mutex<Vec<AudioChunk>>,
        reject: bool,
    }

    impl AvatarEngine for CountingEngine {
        fn register_output_handler(
            &self,
            _handler: Arc<dyn crate::engine::EngineOutputHandler>,
        ) {
        }

        fn clear_output_handlers(&self) {}

        fn start(&self) -> Result<(), EngineError> {
            Ok(())
        }

        fn stop(&self) -> Result<(), EngineError> {
            Ok(())
        }

        fn add_audio(&self, chunk: AudioChunk) -> Result<(), EngineError> {
            if self.reject {
                return Err(EngineError::NotRunning);
            }
            self.chunks.lock().push(chunk);
            Ok(())
        }
    }

    #[test]
    fn test_forwards_chunks_while_active() {
        let engine = Arc::new(CountingEngine::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        let active = Arc::new(AtomicBool::new(true));

        for _ in 0..3 {
            tx.send(AudioChunk::new(vec![0.0; 16])).unwrap();
        }

        let thread_engine: Arc<dyn AvatarEngine> = engine.clone();
        let thread_active = active.clone();
        let handle = std::thread::spawn(move || run(thread_engine, rx, thread_active));

        // Give the loop one timeout window to drain the queue, then stop it.
        std::thread::sleep(Duration::from_millis(50));
        active.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(engine.chunks.lock().len(), 3);
    }

    #[test]
    fn test_exits_within_receive_timeout_of_deactivation() {
        let engine: Arc<dyn AvatarEngine> = Arc::new(CountingEngine::default());
        let (_tx, rx) = crossbeam_channel::unbounded::<AudioChunk>();
        let active = Arc::new(AtomicBool::new(true));

        let thread_active = active.clone();
        let handle = std::thread::spawn(move || run(engine, rx, thread_active));

        std::thread::sleep(Duration::from_millis(20));
        let deactivated = Instant::now();
        active.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        // Shutdown latency is bounded by the receive timeout plus margin.
        assert!(deactivated.elapsed() < RECV_TIMEOUT + Duration::from_millis(100));
    }

    #[test]
    fn test_engine_rejection_does_not_kill_the_loop() {
        let engine: Arc<dyn AvatarEngine> = Arc::new(CountingEngine {
            chunks: Mutex::new(Vec::new()),
            reject: true,
        });
        let (tx, rx) = crossbeam_channel::unbounded();
        let active = Arc::new(AtomicBool::new(true));

        tx.send(AudioChunk::new(vec![0.0; 16])).unwrap();

        let thread_active = active.clone();
        let handle = std::thread::spawn(move || run(engine, rx, thread_active));

        std::thread::sleep(Duration::from_millis(30));
        // Loop must still be alive and joinable after the rejection.
        active.store(false, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn test_disconnect_exits_the_loop() {
        let engine: Arc<dyn AvatarEngine> = Arc::new(CountingEngine::default());
        let (tx, rx) = crossbeam_channel::unbounded::<AudioChunk>();
        let active = Arc::new(AtomicBool::new(true));

        let thread_active = active.clone();
        let handle = std::thread::spawn(move || run(engine, rx, thread_active));

        drop(tx);
        handle.join().unwrap();
        // The loop exited on disconnect, not because anyone cleared the flag.
        assert!(active.load(Ordering::SeqCst));
    }
}
