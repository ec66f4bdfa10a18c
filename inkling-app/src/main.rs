//! Inkling host entry point.
//!
//! Reads JSON requests from stdin, writes replies and model events to stdout.
//! Logs go to stderr (`RUST_LOG`, default `inkling=info`).

mod host;
mod settings;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use inkling_core::{
    inference::stub::StubRecognizer, registry::MemoryModelStore, InkSession,
};
use settings::{default_settings_path, load_settings, save_settings};
use tokio::io::BufReader;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("inkling=info")),
        )
        .init();

    info!("Inkling starting");

    let settings_path = default_settings_path();
    let settings = load_settings(&settings_path);
    if !settings_path.exists() {
        if let Err(e) = save_settings(&settings_path, &settings) {
            warn!(path = %settings_path.display(), "could not write default settings: {e}");
        }
    }
    info!(
        path = %settings_path.display(),
        default_model = %settings.default_model,
        "settings loaded"
    );

    let mut store = MemoryModelStore::new();
    if !settings.supported_models.is_empty() {
        store = store.with_catalog(settings.supported_models.iter().cloned());
    }
    let store = store
        .with_downloaded(settings.preinstalled_models.iter().cloned())
        .with_latency(Duration::from_millis(settings.download_latency_ms));

    let session = Arc::new(
        InkSession::new(
            settings.session_config(),
            Arc::new(store),
            Arc::new(StubRecognizer::new()),
        )
        .context("creating ink session")?,
    );

    match session.warm_up().await {
        Ok(Some(outcome)) => info!(?outcome, "default model ready"),
        Ok(None) => {}
        Err(e) => warn!("default model prefetch failed: {e}"),
    }

    host::serve(session, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
    info!("Inkling exiting");
    Ok(())
}
