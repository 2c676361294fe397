use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use workforce_sync::shared::metrics::ReplayMetricsSnapshot;
use workforce_sync::{
    ActionQueue, AppConfig, HttpReplayGateway, SharedConnectivity, SqliteActionStore,
    SyncOutcome, TracingNotifier, init_logging, spawn_http_probe, spawn_reconnect_sync,
};

#[derive(Debug, Serialize)]
struct ReplayRunReport {
    pending_before: u64,
    pending_after: u64,
    outcome: SyncOutcome,
    metrics: ReplayMetricsSnapshot,
}

fn watch_mode() -> bool {
    env::var("WORKFORCE_SYNC_WATCH")
        .map(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

async fn probe_once(client: &reqwest::Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(_) => true,
        Err(err) => {
            warn!(error = %err, url, "Connectivity probe failed");
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::from_env();
    config
        .validate()
        .map_err(|err| anyhow!("Invalid configuration: {err}"))?;

    let client = reqwest::Client::builder()
        .timeout(config.network.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    // Without a probe URL the network is assumed reachable.
    let initially_online = match &config.network.probe_url {
        Some(url) => probe_once(&client, url).await,
        None => true,
    };
    let connectivity = Arc::new(SharedConnectivity::new(initially_online));

    let queue = Arc::new(ActionQueue::new(
        Arc::new(SqliteActionStore::lazy(config.database.clone())),
        Arc::new(HttpReplayGateway::with_client(client.clone())),
        connectivity.clone(),
        Arc::new(TracingNotifier),
        config.queue.clone(),
    ));

    if !watch_mode() {
        let pending_before = queue.count().await.context("Failed to read offline queue")?;
        let outcome = queue.sync().await.context("Offline sync failed")?;
        let report = ReplayRunReport {
            pending_before,
            pending_after: queue.count().await.context("Failed to read offline queue")?,
            outcome,
            metrics: queue.metrics(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let watcher = spawn_reconnect_sync(queue.clone());
    let probe = config.network.probe_url.clone().map(|url| {
        spawn_http_probe(
            connectivity.clone(),
            client.clone(),
            url,
            config.network.probe_interval(),
        )
    });

    if initially_online {
        let outcome = queue.sync().await.context("Offline sync failed")?;
        info!(?outcome, "Initial offline sync finished");
    }

    info!("Watching connectivity; press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    watcher.abort();
    if let Some(probe) = probe {
        probe.abort();
    }
    info!(metrics = ?queue.metrics(), "Stopped offline queue watcher");
    Ok(())
}
