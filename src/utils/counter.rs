//! Windowed rate counter
//!
//! Counts events and logs the observed rate once per window. Used to keep an
//! eye on the produced video frame rate without a metrics pipeline.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

struct Window {
    started: Instant,
    count: u64,
}

pub struct IntervalCounter {
    name: &'static str,
    window_len: Duration,
    window: Mutex<Window>,
}

impl IntervalCounter {
    pub fn new(name: &'static str) -> Self {
        Self::with_window(name, DEFAULT_WINDOW)
    }

    pub fn with_window(name: &'static str, window_len: Duration) -> Self {
        Self {
            name,
            window_len,
            window: Mutex::new(Window {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Record one event; logs and resets when the window has elapsed.
    pub fn add(&self) {
        let mut window = self.window.lock();
        window.count += 1;
        let elapsed = window.started.elapsed();
        if elapsed >= self.window_len {
            let rate = window.count as f64 / elapsed.as_secs_f64();
            tracing::debug!(counter = self.name, "interval rate {rate:.1}/s");
            window.started = Instant::now();
            window.count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_resets_after_elapse() {
        let counter = IntervalCounter::with_window("test", Duration::from_millis(10));
        counter.add();
        counter.add();
        std::thread::sleep(Duration::from_millis(15));
        counter.add();
        // Window rolled over on the last add.
        assert_eq!(counter.window.lock().count, 0);
    }
}
