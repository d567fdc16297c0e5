//! Worker process entry point
//!
//! Spawned by the supervisor with the serialized config as its single
//! argument. Stdout is the frame pipe, so all logging goes to stderr.

use anyhow::Context;
use facecast::config::WorkerConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "facecast=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match std::env::args().nth(1) {
        Some(json) => serde_json::from_str::<WorkerConfig>(&json)
            .context("invalid worker config argument")?,
        None => WorkerConfig::default(),
    };

    tracing::info!("starting facecast worker v{}", env!("CARGO_PKG_VERSION"));
    facecast::worker::run(config).context("worker failed")?;
    Ok(())
}
