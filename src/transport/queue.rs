//! Media queues with an explicit overflow policy
//!
//! Queues default to unbounded, trading memory for never blocking a
//! producer. A queue can instead be bounded, with a policy for what happens
//! when it fills.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

/// What a producer does when a bounded queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Block the producer until space frees up.
    Block,
    /// Discard the incoming value.
    #[default]
    DropNewest,
    /// Discard the oldest queued value to make room.
    DropOldest,
}

/// Capacity and overflow behavior for one queue.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum queued values; `None` means unbounded, non-blocking producers.
    pub capacity: Option<usize>,

    /// Applied only when `capacity` is set.
    pub overflow: OverflowPolicy,
}

/// One logical channel: a crossbeam pair plus the configured policy.
///
/// The queue keeps its own receiver handle, so consumer clones stay valid
/// across a worker restart and `drain` can empty it from either side.
pub struct MediaQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    overflow: OverflowPolicy,
    dropped: AtomicU64,
}

impl<T> MediaQueue<T> {
    pub fn new(config: ChannelConfig) -> Self {
        let (tx, rx) = match config.capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity.max(1)),
            None => crossbeam_channel::unbounded(),
        };
        Self {
            tx,
            rx,
            overflow: config.overflow,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(ChannelConfig::default())
    }

    /// Enqueue a value, honoring the overflow policy.
    ///
    /// Unbounded queues never reject; the send only fails if the queue
    /// itself is gone, which cannot happen while `self` is alive.
    pub fn push(&self, value: T) {
        match self.tx.try_send(value) {
            Ok(()) => {}
            Err(TrySendError::Full(value)) => self.push_full(value),
            Err(TrySendError::Disconnected(_)) => unreachable!("queue holds its own receiver"),
        }
    }

    fn push_full(&self, value: T) {
        match self.overflow {
            OverflowPolicy::Block => {
                let _ = self.tx.send(value);
            }
            OverflowPolicy::DropNewest => {
                self.count_drop();
            }
            OverflowPolicy::DropOldest => {
                let mut value = value;
                loop {
                    if self.rx.try_recv().is_ok() {
                        self.count_drop();
                    }
                    match self.tx.try_send(value) {
                        Ok(()) => break,
                        Err(TrySendError::Full(v)) => value = v,
                        Err(TrySendError::Disconnected(_)) => break,
                    }
                }
            }
        }
    }

    fn count_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        if total == 1 || total % 100 == 0 {
            tracing::warn!(total, "queue full, dropping media values");
        }
    }

    /// A consumer handle. Clones share the same queue.
    pub fn receiver(&self) -> Receiver<T> {
        self.rx.clone()
    }

    /// Remove everything currently queued. Returns how many values were
    /// discarded.
    pub fn drain(&self) -> usize {
        let mut count = 0;
        while self.rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Values discarded by the overflow policy so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
