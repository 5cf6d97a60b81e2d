use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tracing::debug;

use crate::config::ProxyConfig;
use crate::message::Snapshot;

/// Claim value meaning no refresh is in flight.
const IDLE: u64 = 0;

struct StoreInner {
    current: ArcSwapOption<Snapshot>,
    /// `IDLE` or the epoch of the guard currently holding the marker.
    refreshing: AtomicU64,
    next_epoch: AtomicU64,
    ttl: Duration,
    serve_empty: bool,
}

/// Holds the current snapshot and the single in-flight refresh marker.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<StoreInner>,
}

impl SnapshotStore {
    pub fn new(ttl: Duration) -> Self {
        Self::build(ttl, true)
    }

    /// Treat a fresh but empty snapshot as not ready when `serve_empty` is false.
    pub fn with_empty_policy(ttl: Duration, serve_empty: bool) -> Self {
        Self::build(ttl, serve_empty)
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::build(config.cache_ttl(), config.serve_empty_snapshot)
    }

    fn build(ttl: Duration, serve_empty: bool) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                current: ArcSwapOption::empty(),
                refreshing: AtomicU64::new(IDLE),
                next_epoch: AtomicU64::new(IDLE + 1),
                ttl,
                serve_empty,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// True iff a snapshot is installed and younger than the TTL.
    pub fn is_valid(&self) -> bool {
        self.read_valid().is_some()
    }

    /// Current snapshot, if any has ever been installed. Never blocks.
    pub fn read(&self) -> Option<Arc<Snapshot>> {
        self.inner.current.load_full()
    }

    /// Current snapshot only if it is still valid, checked against the same load.
    pub fn read_valid(&self) -> Option<Arc<Snapshot>> {
        self.read().filter(|snapshot| self.is_fresh(snapshot))
    }

    /// Whether `snapshot` would count as valid under this store's TTL and empty policy.
    pub fn is_fresh(&self, snapshot: &Snapshot) -> bool {
        (self.inner.serve_empty || !snapshot.is_empty()) && snapshot.age() < self.inner.ttl
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire) != IDLE
    }

    /// Claims the in-flight marker. Returns `None` when another pass already holds it.
    pub fn begin_refresh(&self) -> Option<RefreshGuard> {
        let epoch = self.inner.next_epoch.fetch_add(1, Ordering::Relaxed);
        self.inner
            .refreshing
            .compare_exchange(IDLE, epoch, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RefreshGuard {
                store: self.clone(),
                epoch,
                released: false,
            })
    }

    /// Replaces the snapshot and clears the in-flight marker.
    ///
    /// Any guard alive at this point no longer owns the marker; dropping it
    /// later leaves a newer claim untouched.
    pub fn update(&self, snapshot: Snapshot) {
        self.replace(snapshot);
        self.inner.refreshing.store(IDLE, Ordering::Release);
    }

    fn replace(&self, snapshot: Snapshot) {
        debug!(count = snapshot.len(), total = snapshot.total(), "installing snapshot");
        self.inner.current.store(Some(Arc::new(snapshot)));
    }
}

impl fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("cached", &self.read().map(|s| s.len()))
            .field("refreshing", &self.is_refreshing())
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}

/// Proof of holding the in-flight marker. Dropping it releases the marker.
#[must_use = "dropping the guard immediately ends the refresh"]
pub struct RefreshGuard {
    store: SnapshotStore,
    epoch: u64,
    released: bool,
}

impl RefreshGuard {
    /// Publishes the snapshot, then releases the marker.
    pub fn install(mut self, snapshot: Snapshot) {
        self.store.replace(snapshot);
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            // Only clears our own claim.
            let _ = self.store.inner.refreshing.compare_exchange(
                self.epoch,
                IDLE,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
        }
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for RefreshGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshGuard")
            .field("epoch", &self.epoch)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    fn msg(id: &str) -> Message {
        Message {
            id: id.into(),
            user_id: format!("u-{id}"),
            user_name: "Someone".into(),
            timestamp: "2024-10-21T07:28:00Z".into(),
            message: "hello".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn validity_follows_ttl() {
        let store = SnapshotStore::new(Duration::from_secs(300));
        assert!(!store.is_valid());
        assert!(store.read().is_none());

        store.update(Snapshot::new(vec![msg("1")], 1));
        assert!(store.is_valid());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(store.is_valid());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!store.is_valid());
        // Stale data is still readable, only reported invalid.
        assert_eq!(store.read().map(|s| s.len()), Some(1));
        assert!(store.read_valid().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_snapshot_follows_policy() {
        let store = SnapshotStore::new(Duration::from_secs(60));
        store.update(Snapshot::new(Vec::new(), 0));
        assert!(store.is_valid());

        let strict = SnapshotStore::with_empty_policy(Duration::from_secs(60), false);
        strict.update(Snapshot::new(Vec::new(), 0));
        assert!(!strict.is_valid());
        strict.update(Snapshot::new(vec![msg("1")], 1));
        assert!(strict.is_valid());
    }

    #[test]
    fn only_one_refresh_in_flight() {
        let store = SnapshotStore::new(Duration::from_secs(60));
        let first = store.begin_refresh();
        let second = store.begin_refresh();
        assert!(first.is_some());
        assert!(second.is_none());
        assert!(store.is_refreshing());

        drop(first);
        assert!(!store.is_refreshing());
        assert!(store.begin_refresh().is_some());
    }

    #[tokio::test]
    async fn install_publishes_and_releases() {
        let store = SnapshotStore::new(Duration::from_secs(60));
        let guard = store.begin_refresh().expect("marker free");
        guard.install(Snapshot::new(vec![msg("1"), msg("2")], 2));

        assert!(!store.is_refreshing());
        assert!(store.is_valid());
        assert_eq!(store.read().map(|s| s.len()), Some(2));
    }

    #[test]
    fn update_clears_marker() {
        let store = SnapshotStore::new(Duration::from_secs(60));
        let guard = store.begin_refresh().expect("marker free");
        std::mem::forget(guard);
        assert!(store.is_refreshing());

        store.update(Snapshot::new(vec![msg("1")], 1));
        assert!(!store.is_refreshing());
    }

    #[test]
    fn marker_released_when_pass_panics() {
        let store = SnapshotStore::new(Duration::from_secs(60));
        let cloned = store.clone();
        let result = std::thread::spawn(move || {
            let _guard = cloned.begin_refresh().expect("marker free");
            panic!("fetch pass blew up");
        })
        .join();

        assert!(result.is_err());
        assert!(!store.is_refreshing());
        assert!(store.begin_refresh().is_some());
    }

    #[test]
    fn stale_guard_does_not_release_newer_claim() {
        let store = SnapshotStore::new(Duration::from_secs(60));
        let stale = store.begin_refresh().expect("marker free");

        store.update(Snapshot::new(vec![msg("1")], 1));
        let current = store.begin_refresh().expect("update cleared the marker");

        drop(stale);
        assert!(store.is_refreshing());
        assert!(store.begin_refresh().is_none());

        current.install(Snapshot::new(vec![msg("2")], 1));
        assert!(!store.is_refreshing());
        assert!(store.begin_refresh().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn is_fresh_judges_a_given_snapshot() {
        let store = SnapshotStore::new(Duration::from_secs(60));
        let old = Snapshot::new(vec![msg("1")], 1);
        tokio::time::advance(Duration::from_secs(61)).await;
        let new = Snapshot::new(vec![msg("2")], 1);

        assert!(!store.is_fresh(&old));
        assert!(store.is_fresh(&new));
    }
}
