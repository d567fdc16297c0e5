//! Binary latch for bounded-wait handshakes
//!
//! The supervisor waits on these with a timeout; the pump thread sets them
//! when the matching frame arrives from the worker.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// A single-bit signal with set, clear, and bounded wait.
#[derive(Default)]
pub struct Latch {
    state: Mutex<bool>,
    condvar: Condvar,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch and wake all waiters.
    pub fn set(&self) {
        let mut set = self.state.lock();
        *set = true;
        self.condvar.notify_all();
    }

    /// Clear the latch. A no-op if it is already clear.
    pub fn clear(&self) {
        *self.state.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.state.lock()
    }

    /// Block until the latch is set or the timeout elapses.
    ///
    /// Returns `true` if the latch was set within the timeout.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut set = self.state.lock();
        while !*set {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            self.condvar.wait_for(&mut set, deadline - now);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_set_before_wait_returns_immediately() {
        let latch = Latch::new();
        latch.set();
        assert!(latch.wait_for(Duration::from_millis(1)));
    }

    #[test]
    fn test_wait_times_out_when_never_set() {
        let latch = Latch::new();
        let started = Instant::now();
        assert!(!latch.wait_for(Duration::from_millis(50)));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_wakes_on_set_from_another_thread() {
        let latch = Arc::new(Latch::new());
        let setter = Arc::clone(&latch);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            setter.set();
        });
        assert!(latch.wait_for(Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn test_clear_rearms_the_latch() {
        let latch = Latch::new();
        latch.set();
        latch.clear();
        assert!(!latch.is_set());
        assert!(!latch.wait_for(Duration::from_millis(10)));
    }
}
