//! Worker pool behavior against real worker processes.

use std::path::PathBuf;
use std::time::Duration;

use facecast::{AudioChunk, ControlEvent, ReleaseOutcome, WorkerConfig, WorkerPool, WorkerStatus};

fn pool_config() -> WorkerConfig {
    WorkerConfig {
        worker_binary: Some(PathBuf::from(env!("CARGO_BIN_EXE_facecast-worker"))),
        ..WorkerConfig::default()
    }
}

#[test]
fn test_pool_hands_out_idle_workers_until_exhausted() {
    let pool = WorkerPool::new(2, pool_config()).unwrap();
    assert_eq!(pool.len(), 2);

    let first = pool.start_worker().expect("first worker");
    assert_eq!(first.status(), WorkerStatus::Busy);
    let second = pool.start_worker().expect("second worker");
    assert_eq!(second.status(), WorkerStatus::Busy);

    // Both recruited: nothing left to hand out.
    assert!(pool.start_worker().is_none());

    pool.destroy();
}

#[test]
fn test_pool_worker_runs_a_session_after_checkout() {
    let pool = WorkerPool::new(1, pool_config()).unwrap();
    let worker = pool.start_worker().expect("worker");

    // start_worker already pushed START; the session is live.
    worker.push_audio(AudioChunk::new(vec![0.1; 2_400]));
    assert!(worker
        .audio_frames()
        .recv_timeout(Duration::from_secs(5))
        .is_ok());

    worker.send_event(ControlEvent::Stop);
    assert_eq!(worker.release(), ReleaseOutcome::Acknowledged);

    // Released workers become recruitable again.
    assert!(pool.start_worker().is_some());
    pool.destroy();
}
