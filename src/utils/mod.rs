//! Small shared utilities

pub mod counter;

pub use counter::IntervalCounter;
