//! Worker process internals
//!
//! Everything in this module runs inside the spawned `facecast-worker`
//! process: engine bootstrap, the session event loop, the audio feed loop,
//! and the output adapter. The supervisor talks to it only through the
//! framed stdio protocol.

mod audio_feed;
mod output;
mod session;

use std::io::{BufReader, BufWriter, Write};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::config::WorkerConfig;
use crate::engine::{create_engine, AvatarInitOptions, EngineError};
use crate::protocol::{
    read_frame, write_frame, AudioChunk, ControlEvent, FromWorker, ToWorker, AUDIO_SAMPLE_RATE,
};
use crate::transport::MediaQueue;

use session::SessionLoop;

/// Worker bootstrap failures. Anything past bootstrap is logged instead,
/// because by then the supervisor can only observe process exit.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("engine construction failed: {0}")]
    Engine(#[from] EngineError),

    #[error("failed to spawn worker thread: {0}")]
    Thread(#[source] std::io::Error),
}

/// Run the worker process until its control pipe closes.
///
/// Bootstrap order matters: the engine is constructed first, `Ready` goes
/// out exactly once after construction succeeds, and only then does the
/// session event loop start. The calling thread then pumps stdin frames and
/// idles in `read_frame` between them; EOF on stdin is the graceful
/// termination request, answered by returning (and thereby exiting the
/// process).
pub fn run(config: WorkerConfig) -> Result<(), WorkerError> {
    let init_options = AvatarInitOptions {
        audio_sample_rate: AUDIO_SAMPLE_RATE,
        video_frame_rate: config.options.fps,
        avatar_name: config.options.avatar_name.clone(),
        debug: config.options.debug,
        enable_fast_mode: config.options.enable_fast_mode,
        use_gpu: config.options.use_gpu,
    };
    let engine = create_engine(&config.resource_root, config.engine, init_options)?;

    let event_in = Arc::new(MediaQueue::new(config.channels));
    let audio_in = Arc::new(MediaQueue::new(config.channels));
    let (out_tx, out_rx) = crossbeam_channel::unbounded::<FromWorker>();

    spawn_writer(out_rx)?;

    // The engine is loaded; tell the supervisor the handshake can complete.
    if out_tx.send(FromWorker::Ready).is_err() {
        tracing::error!("writer thread gone before readiness could be reported");
    }
    tracing::info!("worker process is ready");

    spawn_session_loop(
        engine,
        Arc::clone(&event_in),
        Arc::clone(&audio_in),
        out_tx,
    )?;

    demux_stdin(&event_in, &audio_in);
    tracing::info!("control pipe closed, worker shutting down");
    Ok(())
}

/// Serialize outbound frames onto stdout. Stdout belongs to this thread
/// alone; logs go to stderr.
fn spawn_writer(out_rx: Receiver<FromWorker>) -> Result<(), WorkerError> {
    std::thread::Builder::new()
        .name("facecast-writer".to_string())
        .spawn(move || {
            let stdout = std::io::stdout();
            let mut w = BufWriter::new(stdout.lock());
            for frame in out_rx {
                if let Err(e) = write_frame(&mut w, &frame) {
                    tracing::warn!("failed to write outbound frame: {e}");
                    break;
                }
            }
            let _ = w.flush();
        })
        .map(|_| ())
        .map_err(WorkerError::Thread)
}

fn spawn_session_loop(
    engine: Arc<dyn crate::engine::AvatarEngine>,
    event_in: Arc<MediaQueue<ControlEvent>>,
    audio_in: Arc<MediaQueue<AudioChunk>>,
    out_tx: Sender<FromWorker>,
) -> Result<(), WorkerError> {
    let session = SessionLoop::new(engine, event_in, audio_in, out_tx);
    std::thread::Builder::new()
        .name("facecast-session".to_string())
        .spawn(move || session.run())
        .map(|_| ())
        .map_err(WorkerError::Thread)
}

/// Route inbound frames to the right queue until EOF.
fn demux_stdin(event_in: &MediaQueue<ControlEvent>, audio_in: &MediaQueue<AudioChunk>) {
    let stdin = std::io::stdin();
    let mut r = BufReader::new(stdin.lock());
    loop {
        match read_frame::<_, ToWorker>(&mut r) {
            Ok(ToWorker::Event(event)) => event_in.push(event),
            Ok(ToWorker::Audio(chunk)) => audio_in.push(chunk),
            Err(e) if e.is_eof() => break,
            Err(e) => {
                // A malformed frame leaves the stream position unknown;
                // resynchronizing is not possible, so treat it as fatal.
                tracing::error!("corrupt inbound frame, shutting down: {e}");
                break;
            }
        }
    }
}
