pub mod api;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod message;
pub mod query;
pub mod refresher;
pub mod store;

pub use api::{Health, SearchApi, SearchResponse, Stats};
pub use config::ProxyConfig;
pub use error::{ConfigError, FetchError, RefreshError, SearchError};
pub use fetcher::{build_client, FetchOutcome, UpstreamFetcher};
pub use message::{Message, MessagePage, Snapshot};
pub use query::{paginate, search, Page, PageLimits, PageRequest};
pub use refresher::{
    refresh_once, spawn_refresher, warm_up, RefreshConfig, RefreshOutcome, RefresherHandle,
};
pub use store::{RefreshGuard, SnapshotStore};
