//! Worker supervision
//!
//! The outward-facing side: owns the child process handle, runs the pump
//! threads that bridge the stdio pipes to the media queues, and exposes the
//! recruit/release/destroy/status lifecycle.

pub mod pool;
pub mod worker;

pub use pool::WorkerPool;
pub use worker::{AvatarWorker, ReleaseOutcome, SupervisorError, WorkerStatus};
