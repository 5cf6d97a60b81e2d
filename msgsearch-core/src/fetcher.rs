use std::time::Duration;

use reqwest::{redirect, Client, ClientBuilder};
use tracing::debug;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::FetchError;
use crate::message::{Message, MessagePage};

const USER_AGENT: &str = concat!("msgsearch/", env!("CARGO_PKG_VERSION"));

/// Shared HTTP client for talking to upstream.
pub fn build_client() -> Result<Client, FetchError> {
    let client = ClientBuilder::new()
        .redirect(redirect::Policy::limited(5))
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Result of one fetch pass. Never an error: a failed page ends the pass
/// and whatever was gathered before it is returned alongside the failure.
#[derive(Debug)]
pub struct FetchOutcome {
    pub messages: Vec<Message>,
    /// Last total reported by upstream, 0 when no page succeeded.
    pub total: usize,
    /// Number of pages that were received and decoded.
    pub pages: usize,
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct UpstreamFetcher {
    client: Client,
    messages_url: Url,
    page_size: usize,
    request_timeout: Duration,
}

impl UpstreamFetcher {
    pub fn new(
        client: Client,
        base_url: &str,
        page_size: usize,
        request_timeout: Duration,
    ) -> Result<Self, FetchError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let messages_url = base.join("messages/")?;
        Ok(Self {
            client,
            messages_url,
            page_size: page_size.max(1),
            request_timeout,
        })
    }

    pub fn from_config(client: Client, config: &ProxyConfig) -> Result<Self, FetchError> {
        Self::new(
            client,
            &config.upstream_base_url,
            config.page_size,
            config.request_timeout(),
        )
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn fetch_page(&self, skip: usize, limit: usize) -> Result<MessagePage, FetchError> {
        let response = self
            .client
            .get(self.messages_url.clone())
            .query(&[("skip", skip), ("limit", limit)])
            .timeout(self.request_timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let bytes = response.bytes().await?;
        let page = serde_json::from_slice::<MessagePage>(&bytes)?;
        Ok(page)
    }

    /// Walks the feed page by page from offset 0, one request at a time.
    ///
    /// Stops on an empty page, once the offset reaches the reported total,
    /// or at the first failing page.
    pub async fn fetch_all(&self) -> FetchOutcome {
        let mut outcome = FetchOutcome {
            messages: Vec::new(),
            total: 0,
            pages: 0,
            error: None,
        };
        let mut skip = 0;

        loop {
            let page = match self.fetch_page(skip, self.page_size).await {
                Ok(page) => page,
                Err(err) => {
                    debug!(skip, error = %err, "upstream page failed, ending pass");
                    outcome.error = Some(err);
                    break;
                }
            };

            outcome.pages += 1;
            outcome.total = page.total;
            debug!(skip, items = page.items.len(), total = page.total, "fetched upstream page");

            if page.items.is_empty() {
                break;
            }
            outcome.messages.extend(page.items);
            skip += self.page_size;

            if skip >= outcome.total {
                break;
            }
        }

        outcome
    }
}
