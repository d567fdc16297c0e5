//! Worker configuration
//!
//! The supervisor serializes this whole structure to JSON and hands it to
//! the worker binary as its single argument, so both processes are built
//! from the same values.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::EngineKind;
use crate::transport::queue::ChannelConfig;

/// Rendering options forwarded to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarOptions {
    /// Avatar identity to load from the resource root.
    pub avatar_name: String,

    /// Target video frame rate.
    pub fps: u32,

    /// Extra engine diagnostics.
    pub debug: bool,

    /// Trade rendering quality for latency.
    pub enable_fast_mode: bool,

    /// Render on the GPU when available.
    pub use_gpu: bool,
}

impl Default for AvatarOptions {
    fn default() -> Self {
        Self {
            avatar_name: "sample_data".to_string(),
            fps: 25,
            debug: false,
            enable_fast_mode: false,
            use_gpu: true,
        }
    }
}

/// Everything needed to spawn and run one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Path to the worker executable. When unset, the supervisor looks for
    /// `facecast-worker` next to the current executable, then on PATH.
    pub worker_binary: Option<PathBuf>,

    /// Directory holding avatar model resources.
    pub resource_root: PathBuf,

    /// Which rendering algorithm the worker loads.
    pub engine: EngineKind,

    pub options: AvatarOptions,

    /// Bound and overflow policy applied to every media queue.
    pub channels: ChannelConfig,

    /// How long `recruit` waits for the readiness handshake.
    pub recruit_timeout_ms: u64,

    /// How long `release` waits for the stop acknowledgement.
    pub release_timeout_ms: u64,

    /// Grace period between requesting termination and force-killing.
    pub destroy_grace_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_binary: None,
            resource_root: PathBuf::from("."),
            engine: EngineKind::default(),
            options: AvatarOptions::default(),
            channels: ChannelConfig::default(),
            recruit_timeout_ms: 2_000,
            release_timeout_ms: 2_000,
            destroy_grace_ms: 5_000,
        }
    }
}

impl WorkerConfig {
    pub fn recruit_timeout(&self) -> Duration {
        Duration::from_millis(self.recruit_timeout_ms)
    }

    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }

    pub fn destroy_grace(&self) -> Duration {
        Duration::from_millis(self.destroy_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = WorkerConfig::default();
        assert_eq!(config.options.avatar_name, "sample_data");
        assert_eq!(config.options.fps, 25);
        assert!(config.options.use_gpu);
        assert!(!config.options.enable_fast_mode);
        assert_eq!(config.recruit_timeout(), Duration::from_secs(2));
        assert_eq!(config.release_timeout(), Duration::from_secs(2));
        assert_eq!(config.destroy_grace(), Duration::from_secs(5));
        assert!(config.channels.capacity.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: WorkerConfig =
            serde_json::from_str(r#"{"options": {"fps": 30}, "recruit_timeout_ms": 500}"#).unwrap();
        assert_eq!(config.options.fps, 30);
        assert_eq!(config.options.avatar_name, "sample_data");
        assert_eq!(config.recruit_timeout(), Duration::from_millis(500));
    }
}
