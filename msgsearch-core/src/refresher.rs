use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::error::RefreshError;
use crate::fetcher::{FetchOutcome, UpstreamFetcher};
use crate::message::Snapshot;
use crate::store::{RefreshGuard, SnapshotStore};

#[derive(Debug, Clone, Copy)]
pub struct RefreshConfig {
    pub interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl From<&ProxyConfig> for RefreshConfig {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            interval: config.refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A snapshot was published. `complete` is false when the pass stopped on a failing page.
    Installed {
        count: usize,
        total: usize,
        complete: bool,
    },
    /// Another pass was already in flight.
    Skipped,
    /// Not a single page came back; the previous snapshot stays in place.
    Failed,
}

/// Runs one fetch-and-install pass unless another one is in flight.
pub async fn refresh_once(store: &SnapshotStore, fetcher: &UpstreamFetcher) -> RefreshOutcome {
    let Some(guard) = store.begin_refresh() else {
        debug!("refresh already in flight, skipping");
        return RefreshOutcome::Skipped;
    };

    let outcome = fetcher.fetch_all().await;
    publish(guard, outcome)
}

/// The startup pass. Callers should not report ready before it returns.
pub async fn warm_up(store: &SnapshotStore, fetcher: &UpstreamFetcher) -> RefreshOutcome {
    info!("initializing cache");
    let outcome = refresh_once(store, fetcher).await;
    match outcome {
        RefreshOutcome::Installed { count, .. } => info!(count, "cache initialized"),
        RefreshOutcome::Failed => warn!("cache initialization failed, serving not-ready until next refresh"),
        RefreshOutcome::Skipped => {}
    }
    outcome
}

fn publish(guard: RefreshGuard, outcome: FetchOutcome) -> RefreshOutcome {
    let complete = outcome.is_complete();
    if let Some(err) = &outcome.error {
        if outcome.pages == 0 {
            warn!(error = %err, "refresh failed before any page arrived, keeping previous snapshot");
            return RefreshOutcome::Failed;
        }
        warn!(
            error = %err,
            fetched = outcome.messages.len(),
            total = outcome.total,
            "refresh pass cut short, installing partial snapshot"
        );
    }

    let count = outcome.messages.len();
    let total = outcome.total;
    let mut snapshot = Snapshot::new(outcome.messages, total);
    if !complete {
        snapshot = snapshot.truncated();
    }
    guard.install(snapshot);
    info!(count, total, "cache refreshed");

    RefreshOutcome::Installed {
        count,
        total,
        complete,
    }
}

pub struct RefresherHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signals the loop and waits for it. A pass already running is allowed to finish.
    pub async fn stop(self) -> Result<(), RefreshError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(RefreshError::from)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Refreshes the store every `config.interval`, first tick one interval from now.
pub fn spawn_refresher(
    store: SnapshotStore,
    fetcher: UpstreamFetcher,
    config: RefreshConfig,
) -> RefresherHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let join = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + config.interval, config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("refresher shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    refresh_once(&store, &fetcher).await;
                }
            }
        }
    });

    RefresherHandle { cancel_tx, join }
}
