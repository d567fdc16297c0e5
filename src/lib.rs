//! Facecast - avatar renderer worker supervision.
//!
//! Supervises one long-lived worker process hosting a stateful avatar
//! rendering engine and mediates a single session of activity on it at a
//! time: subprocess lifecycle with a readiness handshake and termination
//! escalation, a START/STOP session protocol with acknowledgement, and
//! streamed audio/video over framed stdio pipes.

pub mod config;
pub mod engine;
pub mod protocol;
pub mod supervisor;
pub mod transport;
pub mod utils;
pub mod worker;

pub use config::{AvatarOptions, WorkerConfig};
pub use protocol::{AudioChunk, ControlEvent, VideoFrame, AUDIO_SAMPLE_RATE};
pub use supervisor::{AvatarWorker, ReleaseOutcome, SupervisorError, WorkerPool, WorkerStatus};
