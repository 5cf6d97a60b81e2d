use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    /// Kept verbatim as sent by upstream.
    pub timestamp: String,
    pub message: String,
}

/// One page as returned by `GET /messages/`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessagePage {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub items: Vec<Message>,
}

/// Point-in-time copy of the whole upstream dataset.
///
/// Built once per refresh pass and never mutated afterwards; the store
/// swaps whole snapshots rather than editing one in place.
#[derive(Debug, Clone)]
pub struct Snapshot {
    messages: Vec<Message>,
    total: usize,
    complete: bool,
    fetched_at: DateTime<Utc>,
    fetched_instant: Instant,
}

impl Snapshot {
    pub fn new(messages: Vec<Message>, total: usize) -> Self {
        Self {
            messages,
            total,
            complete: true,
            fetched_at: Utc::now(),
            fetched_instant: Instant::now(),
        }
    }

    /// Marks a snapshot produced by a pass that stopped before reaching the end of the feed.
    pub fn truncated(mut self) -> Self {
        self.complete = false;
        self
    }

    /// Messages in upstream fetch order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Count reported by upstream, which may differ from `len()` if the feed moved mid-fetch.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn age(&self) -> Duration {
        self.fetched_instant.elapsed()
    }

    pub fn unique_users(&self) -> usize {
        self.messages
            .iter()
            .map(|msg| msg.user_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}
