//! kvrelayd — HTTP daemon exposing a managed key-value store's remote
//! datapath protocol in front of an in-process engine.

mod config;
mod snapshot;

use std::sync::Arc;

use anyhow::{Context, Result};
use kvrelay_engine::{Engine, MemoryEngine};
use kvrelay_relay::ApiState;

use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match Config::parse(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            eprintln!();
            eprintln!("{}", Config::usage());
            std::process::exit(2);
        }
    };

    tracing::info!(
        host = %config.host,
        port = config.port,
        database_id = %config.database_id,
        "kvrelayd starting"
    );

    let memory_engine = MemoryEngine::new();
    if let Some(path) = &config.data_file {
        let loaded = snapshot::load(&memory_engine, path).context("loading engine data-file")?;
        tracing::info!(entries = loaded, path = %path.display(), "seeded engine from data-file");
    }

    let dump_engine = memory_engine.clone();
    let engine: Arc<dyn Engine> = Arc::new(memory_engine);

    let state = ApiState::new(
        engine,
        config.database_id,
        config.access_token.clone(),
        config.ephemeral_token_ttl,
    );

    let result = kvrelay_relay::serve(state, &config.host, config.port, shutdown_signal()).await;

    if let Some(path) = &config.dump_path {
        let entries = dump_engine.snapshot_entries();
        if let Err(err) = snapshot::write(path, &entries) {
            tracing::warn!(error = %err, path = %path.display(), "failed to write data-file dump");
        } else {
            tracing::info!(entries = entries.len(), path = %path.display(), "wrote engine data-file dump");
        }
    }

    result
}

/// Waits for a process-level interrupt; `axum::serve`'s graceful shutdown
/// drains in-flight requests once this future resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}
