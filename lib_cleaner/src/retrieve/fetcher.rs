//! # Subscription Fetcher
//!
//! A thin `reqwest` wrapper that downloads each subscription body with a
//! bounded timeout and a fixed client user agent, optionally through an
//! outbound proxy, and hands the text to the `PayloadDecoder`.

use futures_util::future::join_all;
use reqwest::Client;
use tracing::{info, warn};

use crate::configs::{FetchPolicy, SourceSettings};
use crate::errors::{CleanerError, SourceError};
use crate::model::NodeDescriptor;
use crate::retrieve::decoder::PayloadDecoder;

/// Downloads and decodes subscription sources.
pub struct SourceFetcher {
    /// Reused across runs for connection pooling.
    client: Client,
    decoder: PayloadDecoder,
    policy: FetchPolicy,
}

impl SourceFetcher {
    /// Builds the HTTP client from the source settings.
    ///
    /// # Errors
    /// Fails if the outbound proxy URL is rejected by `reqwest` or the
    /// client cannot be constructed.
    pub fn new(settings: &SourceSettings) -> Result<Self, CleanerError> {
        let mut builder = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone());

        if let Some(proxy_url) = &settings.outbound_proxy {
            info!(proxy = %proxy_url, "Using outbound proxy for subscription fetches");
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
            decoder: PayloadDecoder::default(),
            policy: settings.policy,
        })
    }

    /// Fetches `urls` under the configured policy.
    ///
    /// Never fails: each failing source is logged and skipped, and an
    /// empty list means every source failed.
    pub async fn fetch(&self, urls: &[String]) -> Vec<NodeDescriptor> {
        match self.policy {
            FetchPolicy::AggregateAll => self.fetch_aggregate(urls).await,
            FetchPolicy::FirstSuccess => self.fetch_first_success(urls).await,
        }
    }

    /// Sources share no state, so they are fetched concurrently; output
    /// keeps the configured source order.
    async fn fetch_aggregate(&self, urls: &[String]) -> Vec<NodeDescriptor> {
        let results = join_all(urls.iter().map(|url| self.fetch_one(url))).await;

        let mut nodes = Vec::new();
        for result in results {
            match result {
                Ok(mut batch) => nodes.append(&mut batch),
                Err(e) => warn!("Skipping source: {}", e),
            }
        }
        nodes
    }

    async fn fetch_first_success(&self, urls: &[String]) -> Vec<NodeDescriptor> {
        for url in urls {
            match self.fetch_one(url).await {
                Ok(batch) if !batch.is_empty() => return batch,
                Ok(_) => warn!(url = %url, "Source decoded but carried no nodes, trying next"),
                Err(e) => warn!("Skipping source: {}", e),
            }
        }
        Vec::new()
    }

    /// Fetches and decodes a single source.
    pub async fn fetch_one(&self, url: &str) -> Result<Vec<NodeDescriptor>, SourceError> {
        info!(url = %url, "Fetching subscription");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| SourceError::Transport { url: url.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let body = response
            .text()
            .await
            .map_err(|source| SourceError::Transport { url: url.to_string(), source })?;

        let nodes = self
            .decoder
            .decode(&body)
            .map_err(|source| SourceError::Decode { url: url.to_string(), source })?;

        info!(url = %url, count = nodes.len(), "Loaded proxies from source");
        Ok(nodes)
    }
}
