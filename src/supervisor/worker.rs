//! Avatar worker handle
//!
//! Spawns the worker process with piped stdin/stdout (stderr is inherited so
//! worker logs land with the supervisor's), pumps frames between the pipes
//! and the five media queues, and drives the readiness and stop
//! handshakes.

use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;

use crate::config::WorkerConfig;
use crate::protocol::{
    read_frame, write_frame, AudioChunk, ControlEvent, FromWorker, ToWorker, VideoFrame,
};
use crate::transport::{Latch, MediaQueue};

/// Poll interval while waiting for the child to exit during destroy.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Whether the worker is currently recruited for a session.
///
/// This tracks recruit/release pairing only; it is deliberately not coupled
/// to the engine's own session state inside the worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Idle,
    Busy,
}

/// How a `release` completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The worker acknowledged the stop before the timeout.
    Acknowledged,
    /// No acknowledgement arrived in time; the worker was released anyway.
    TimedOut,
}

/// Supervisor failures.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("worker process was not ready within {0:?}")]
    ReadinessTimeout(Duration),

    #[error("failed to spawn worker process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("failed to serialize worker config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Latches and outbound queues shared with the pump threads.
struct Shared {
    ready: Latch,
    stopped: Latch,
    event_out: MediaQueue<ControlEvent>,
    audio_out: MediaQueue<AudioChunk>,
    video_out: MediaQueue<VideoFrame>,
}

pub struct AvatarWorker {
    config: WorkerConfig,
    config_json: String,
    child: Mutex<Option<Child>>,
    stdin: Arc<Mutex<Option<BufWriter<ChildStdin>>>>,
    shared: Arc<Shared>,
    event_in: Arc<MediaQueue<ControlEvent>>,
    audio_in: Arc<MediaQueue<AudioChunk>>,
    status: RwLock<WorkerStatus>,
}

impl AvatarWorker {
    /// Create the queues, start the input mux thread, and spawn the worker
    /// process.
    pub fn spawn(config: WorkerConfig) -> Result<Self, SupervisorError> {
        let config_json = serde_json::to_string(&config)?;
        let shared = Arc::new(Shared {
            ready: Latch::new(),
            stopped: Latch::new(),
            event_out: MediaQueue::new(config.channels),
            audio_out: MediaQueue::new(config.channels),
            video_out: MediaQueue::new(config.channels),
        });
        // Nothing is running yet, which is exactly the acknowledged-stop
        // state.
        shared.stopped.set();

        let worker = Self {
            event_in: Arc::new(MediaQueue::new(config.channels)),
            audio_in: Arc::new(MediaQueue::new(config.channels)),
            stdin: Arc::new(Mutex::new(None)),
            child: Mutex::new(None),
            status: RwLock::new(WorkerStatus::Idle),
            shared,
            config,
            config_json,
        };
        worker.spawn_mux_thread()?;
        worker.spawn_child()?;
        Ok(worker)
    }

    /// Recruit the worker for a new session.
    ///
    /// Restarts the worker process if it died, re-arms the stop latch, and
    /// waits for the readiness handshake. Readiness timeout is a hard
    /// failure: no session can be assumed usable.
    pub fn recruit(&self) -> Result<(), SupervisorError> {
        if !self.is_alive() {
            tracing::info!("worker process not alive, restarting it");
            self.spawn_child()?;
        }

        if self.shared.stopped.is_set() {
            self.shared.stopped.clear();
        }

        let timeout = self.config.recruit_timeout();
        if !self.shared.ready.wait_for(timeout) {
            return Err(SupervisorError::ReadinessTimeout(timeout));
        }

        *self.status.write() = WorkerStatus::Busy;
        tracing::info!("worker recruited for a new session");
        Ok(())
    }

    /// Release the worker after a session.
    ///
    /// Waits for the stop acknowledgement; a timeout degrades to a warning
    /// and the worker is marked idle regardless.
    pub fn release(&self) -> ReleaseOutcome {
        tracing::info!("releasing worker");
        let outcome = if self.shared.stopped.wait_for(self.config.release_timeout()) {
            tracing::info!("stop acknowledgement received");
            ReleaseOutcome::Acknowledged
        } else {
            tracing::warn!("stop acknowledgement timed out, forcing release");
            ReleaseOutcome::TimedOut
        };
        *self.status.write() = WorkerStatus::Idle;
        outcome
    }

    /// Current recruit/release status. No side effects.
    pub fn status(&self) -> WorkerStatus {
        *self.status.read()
    }

    /// Tear the worker process down.
    ///
    /// Requests graceful termination by closing the worker's stdin, waits
    /// out the grace period, then escalates to a kill. Best effort: every
    /// failure is logged and none escape.
    pub fn destroy(&self) {
        let mut child_guard = self.child.lock();
        let Some(child) = child_guard.as_mut() else {
            return;
        };

        match child.try_wait() {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::info!("terminating worker process");
                // Dropping our end of the pipe is the termination request.
                self.stdin.lock().take();
                if !self.wait_for_exit(child, self.config.destroy_grace()) {
                    tracing::warn!("worker still alive after grace period, killing it");
                    if let Err(e) = child.kill() {
                        tracing::error!("failed to kill worker process: {e}");
                    }
                    if let Err(e) = child.wait() {
                        tracing::error!("failed to reap worker process: {e}");
                    }
                }
            }
            Err(e) => tracing::error!("could not check worker liveness: {e}"),
        }

        *child_guard = None;
        tracing::info!("worker process terminated");
    }

    /// True while the worker process is running.
    pub fn is_alive(&self) -> bool {
        let mut child_guard = self.child.lock();
        match child_guard.as_mut() {
            Some(child) => match child.try_wait() {
                Ok(None) => true,
                Ok(Some(_)) => false,
                Err(e) => {
                    tracing::error!("could not check worker liveness: {e}");
                    false
                }
            },
            None => false,
        }
    }

    /// Push a control event to the worker.
    pub fn send_event(&self, event: ControlEvent) {
        self.event_in.push(event);
    }

    /// Push an audio chunk to the worker.
    pub fn push_audio(&self, chunk: AudioChunk) {
        self.audio_in.push(chunk);
    }

    /// Status notifications coming back from the worker.
    pub fn events(&self) -> Receiver<ControlEvent> {
        self.shared.event_out.receiver()
    }

    /// Rendered output audio.
    pub fn audio_frames(&self) -> Receiver<AudioChunk> {
        self.shared.audio_out.receiver()
    }

    /// Rendered video frames.
    pub fn video_frames(&self) -> Receiver<VideoFrame> {
        self.shared.video_out.receiver()
    }

    /// True when every caller-visible queue is empty.
    pub fn channels_empty(&self) -> bool {
        self.event_in.is_empty()
            && self.audio_in.is_empty()
            && self.shared.event_out.is_empty()
            && self.shared.audio_out.is_empty()
            && self.shared.video_out.is_empty()
    }

    fn wait_for_exit(&self, child: &mut Child, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            match child.try_wait() {
                Ok(Some(_)) => return true,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        return false;
                    }
                    std::thread::sleep(EXIT_POLL_INTERVAL);
                }
                Err(e) => {
                    tracing::error!("could not check worker liveness: {e}");
                    return false;
                }
            }
        }
    }

    fn worker_binary(&self) -> PathBuf {
        if let Some(path) = &self.config.worker_binary {
            return path.clone();
        }
        if let Ok(exe) = std::env::current_exe() {
            let sibling = exe.with_file_name(worker_binary_name());
            if sibling.exists() {
                return sibling;
            }
        }
        PathBuf::from(worker_binary_name())
    }

    /// Spawn the worker process, wire the pipes, and start its demux thread.
    /// The ready latch is re-armed so a stale handshake from a previous
    /// process cannot satisfy the next recruit.
    fn spawn_child(&self) -> Result<(), SupervisorError> {
        self.shared.ready.clear();

        let binary = self.worker_binary();
        let mut child = Command::new(&binary)
            .arg(&self.config_json)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                tracing::error!(binary = %binary.display(), "failed to spawn worker: {e}");
                SupervisorError::Spawn(e)
            })?;

        let stdin = child
            .stdin
            .take()
            .map(BufWriter::new)
            .ok_or_else(|| SupervisorError::Spawn(missing_pipe("stdin")))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| SupervisorError::Spawn(missing_pipe("stdout")))?;

        *self.child.lock() = Some(child);
        *self.stdin.lock() = Some(stdin);
        self.spawn_demux_thread(stdout)?;

        tracing::info!(binary = %binary.display(), "worker process spawned");
        Ok(())
    }

    /// One long-lived thread that forwards caller pushes to the worker's
    /// stdin. It survives worker restarts because it writes through the
    /// shared stdin slot rather than owning the pipe.
    fn spawn_mux_thread(&self) -> Result<(), SupervisorError> {
        let event_rx = self.event_in.receiver();
        let audio_rx = self.audio_in.receiver();
        let stdin = Arc::clone(&self.stdin);

        std::thread::Builder::new()
            .name("facecast-mux".to_string())
            .spawn(move || loop {
                let frame = crossbeam_channel::select! {
                    recv(event_rx) -> msg => match msg {
                        Ok(event) => ToWorker::Event(event),
                        Err(_) => break,
                    },
                    recv(audio_rx) -> msg => match msg {
                        Ok(chunk) => ToWorker::Audio(chunk),
                        Err(_) => break,
                    },
                };
                let mut slot = stdin.lock();
                match slot.as_mut() {
                    Some(w) => {
                        if let Err(e) = write_frame(w, &frame) {
                            tracing::warn!("failed to write frame to worker: {e}");
                            // The pipe is broken; drop it so later pushes
                            // are discarded quietly until a respawn.
                            *slot = None;
                        }
                    }
                    None => tracing::debug!("worker stdin closed, dropping frame"),
                }
            })
            .map(|_| ())
            .map_err(SupervisorError::Spawn)
    }

    /// One thread per child: reads worker frames, drives the latches, and
    /// fills the outbound queues. On the stop acknowledgement it drains the
    /// outbound triple (the inbound pair was already drained worker-side),
    /// completing the five-channel drain guarantee before the latch fires.
    fn spawn_demux_thread(
        &self,
        mut stdout: BufReader<ChildStdout>,
    ) -> Result<(), SupervisorError> {
        let shared = Arc::clone(&self.shared);
        std::thread::Builder::new()
            .name("facecast-demux".to_string())
            .spawn(move || {
                loop {
                    match read_frame::<_, FromWorker>(&mut stdout) {
                        Ok(FromWorker::Ready) => shared.ready.set(),
                        Ok(FromWorker::StopAck) => {
                            let dropped = shared.event_out.drain()
                                + shared.audio_out.drain()
                                + shared.video_out.drain();
                            if dropped > 0 {
                                tracing::debug!(dropped, "drained output queues on stop");
                            }
                            shared.stopped.set();
                        }
                        Ok(FromWorker::Event(event)) => shared.event_out.push(event),
                        Ok(FromWorker::Audio(chunk)) => shared.audio_out.push(chunk),
                        Ok(FromWorker::Video(frame)) => shared.video_out.push(frame),
                        Err(e) => {
                            if e.is_eof() {
                                tracing::info!("worker output pipe closed");
                            } else {
                                tracing::warn!("worker output pipe failed: {e}");
                            }
                            break;
                        }
                    }
                }
            })
            .map(|_| ())
            .map_err(SupervisorError::Spawn)
    }
}

impl Drop for AvatarWorker {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn missing_pipe(name: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("failed to capture worker {name}"),
    )
}

fn worker_binary_name() -> &'static str {
    if cfg!(windows) {
        "facecast-worker.exe"
    } else {
        "facecast-worker"
    }
}
