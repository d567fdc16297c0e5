//! In-process plumbing shared by both sides of the pipe
//!
//! Queues with an explicit overflow policy, and the binary latches used for
//! the readiness and stop-acknowledgement handshakes.

pub mod latch;
pub mod queue;

pub use latch::Latch;
pub use queue::MediaQueue;
