use std::path::PathBuf;

use anyhow::Context;
use msgsearch_core::{
    build_client, spawn_refresher, warm_up, ProxyConfig, RefreshConfig, SearchApi, SnapshotStore,
    UpstreamFetcher,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();
    let client = build_client().context("failed to build HTTP client")?;
    let fetcher = UpstreamFetcher::from_config(client, &config)
        .context("invalid upstream base url")?;
    let store = SnapshotStore::from_config(&config);

    warm_up(&store, &fetcher).await;
    let api = SearchApi::from_config(store.clone(), &config);
    let health = api.health();
    info!(
        upstream = %config.upstream_base_url,
        cache_valid = health.cache_valid,
        cached = health.cached_count,
        "search cache ready"
    );

    let refresher = spawn_refresher(store, fetcher, RefreshConfig::from(&config));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    refresher.stop().await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// `MSGSEARCH_CONFIG` overrides the default config location.
fn load_config() -> ProxyConfig {
    match std::env::var_os("MSGSEARCH_CONFIG") {
        Some(path) => ProxyConfig::from_file(PathBuf::from(path)),
        None => ProxyConfig::load(),
    }
}
