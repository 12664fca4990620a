//! harbor worker entry point.
//!
//! Reads one JSON event per stdin line and writes one JSON result per stdout
//! line. Logging goes to stderr to keep stdout for the event protocol.

use std::sync::Arc;

use anyhow::Result;
use harbor_client::{FetchClient, FetchConfig};
use harbor_core::{AppConfig, CacheDb, CacheStoreRegistry};
use harbor_worker::clients::{LogNotifier, WindowRegistry};
use harbor_worker::sync::StubSyncBackend;
use harbor_worker::{AppManifest, Event, Worker, WorkerDeps};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let scope = config.scope()?;
    tracing::info!(db = %config.db_path.display(), scope = %scope, "starting harbor worker on stdio");

    let storage = Arc::new(CacheDb::open(&config.db_path).await?);
    let network = Arc::new(FetchClient::new(FetchConfig {
        user_agent: config.user_agent.clone(),
        max_bytes: config.max_bytes,
        timeout: config.timeout(),
        ..Default::default()
    })?);
    let deps = WorkerDeps {
        storage,
        network,
        clients: Arc::new(WindowRegistry::new()),
        notifier: Arc::new(LogNotifier),
        sync: Arc::new(StubSyncBackend::default()),
    };
    let worker = Worker::new(AppManifest::builtin(&scope)?, CacheStoreRegistry::current(), &config.app_name, deps);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Event>(&line) {
            Ok(event) => match worker.dispatch(event).await {
                Ok(outcome) => json!({ "ok": outcome }),
                Err(e) => json!({ "error": e.to_string() }),
            },
            Err(e) => json!({ "error": format!("INVALID_INPUT: {e}") }),
        };

        let mut out = serde_json::to_vec(&reply)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    worker.flush().await;
    tracing::info!("stdin closed, shutting down");
    Ok(())
}
