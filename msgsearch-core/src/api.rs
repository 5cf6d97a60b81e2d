use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ProxyConfig;
use crate::error::SearchError;
use crate::message::Message;
use crate::query::{paginate, search, PageLimits, PageRequest};
use crate::store::SnapshotStore;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Health {
    pub cache_valid: bool,
    pub cached_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResponse {
    /// Matches across all pages.
    pub total: usize,
    pub items: Vec<Message>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub query: Option<String>,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Stats {
    pub total_messages: usize,
    pub unique_users: usize,
    pub last_updated: DateTime<Utc>,
    pub age_seconds: u64,
    pub cache_valid: bool,
}

/// Read side handed to whatever serves requests. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SearchApi {
    store: SnapshotStore,
    limits: PageLimits,
}

impl SearchApi {
    pub fn new(store: SnapshotStore, limits: PageLimits) -> Self {
        Self { store, limits }
    }

    pub fn from_config(store: SnapshotStore, config: &ProxyConfig) -> Self {
        Self::new(store, config.page_limits())
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn limits(&self) -> &PageLimits {
        &self.limits
    }

    pub fn health(&self) -> Health {
        let snapshot = self.store.read();
        Health {
            cache_valid: snapshot.as_ref().is_some_and(|s| self.store.is_fresh(s)),
            cached_count: snapshot.as_ref().map_or(0, |s| s.len()),
            last_updated: snapshot.map(|s| s.fetched_at()),
        }
    }

    /// Filters the current snapshot and returns one page of it.
    ///
    /// Fails with [`SearchError::CacheNotReady`] while no valid snapshot is held.
    pub fn search(
        &self,
        query: Option<&str>,
        request: PageRequest,
    ) -> Result<SearchResponse, SearchError> {
        let started = Instant::now();
        let snapshot = self.store.read_valid().ok_or(SearchError::CacheNotReady)?;

        let filtered = search(query, snapshot.messages());
        let page = paginate(&filtered, request);
        let items = page.items.iter().map(|msg| (*msg).clone()).collect();
        let elapsed_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

        Ok(SearchResponse {
            total: page.total,
            items,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
            query: query.map(ToOwned::to_owned),
            elapsed_ms,
        })
    }

    /// Validates raw paging input against the configured limits before searching.
    pub fn search_raw(
        &self,
        query: Option<&str>,
        page: Option<usize>,
        page_size: Option<usize>,
    ) -> Result<SearchResponse, SearchError> {
        let request = PageRequest::new(page, page_size, &self.limits)?;
        self.search(query, request)
    }

    pub fn stats(&self) -> Result<Stats, SearchError> {
        let snapshot = self.store.read().ok_or(SearchError::NoData)?;
        Ok(Stats {
            total_messages: snapshot.len(),
            unique_users: snapshot.unique_users(),
            last_updated: snapshot.fetched_at(),
            age_seconds: snapshot.age().as_secs(),
            cache_valid: self.store.is_fresh(&snapshot),
        })
    }
}
