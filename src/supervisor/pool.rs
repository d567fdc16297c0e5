//! Fixed-size worker pool
//!
//! Pre-spawns a set of workers so a session can start without paying the
//! engine load time. Spawns can be staggered to keep several engines from
//! loading models at once.

use std::time::Duration;

use crate::config::WorkerConfig;
use crate::protocol::ControlEvent;

use super::worker::{AvatarWorker, SupervisorError, WorkerStatus};

pub struct WorkerPool {
    workers: Vec<AvatarWorker>,
}

impl WorkerPool {
    /// Spawn `size` workers from the same config.
    pub fn new(size: usize, config: WorkerConfig) -> Result<Self, SupervisorError> {
        Self::with_stagger(size, config, Duration::ZERO)
    }

    /// Spawn `size` workers, sleeping `stagger` between spawns.
    pub fn with_stagger(
        size: usize,
        config: WorkerConfig,
        stagger: Duration,
    ) -> Result<Self, SupervisorError> {
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            if index > 0 && !stagger.is_zero() {
                std::thread::sleep(stagger);
            }
            workers.push(AvatarWorker::spawn(config.clone())?);
        }
        tracing::info!(size, "worker pool ready");
        Ok(Self { workers })
    }

    /// Recruit the first idle worker and start a session on it.
    ///
    /// Returns `None` when every worker is busy or the idle one failed its
    /// readiness handshake.
    pub fn start_worker(&self) -> Option<&AvatarWorker> {
        for worker in &self.workers {
            if worker.status() != WorkerStatus::Idle {
                continue;
            }
            match worker.recruit() {
                Ok(()) => {
                    worker.send_event(ControlEvent::Start);
                    return Some(worker);
                }
                Err(e) => {
                    tracing::error!("failed to recruit idle worker: {e}");
                    return None;
                }
            }
        }
        tracing::warn!("no idle worker available");
        None
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> &[AvatarWorker] {
        &self.workers
    }

    /// Tear down every worker. Best effort, like `AvatarWorker::destroy`.
    pub fn destroy(&self) {
        tracing::info!("destroying worker pool");
        for worker in &self.workers {
            worker.destroy();
        }
    }
}
