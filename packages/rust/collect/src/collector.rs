//! Channel-aware collection: route URLs, then fetch each bucket with its
//! channel's strategy.

use tracing::{info, instrument};

use researcher_shared::{RawDocument, Result};

use crate::channels::{Channel, channels_for_product_type, route};
use crate::fetcher::Fetcher;
use crate::strategy::{FetchStrategy, resolve_strategy};

/// Options for one [`Collector::collect`] call.
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Selects both the default strategy and the built-in channel set.
    pub product_type: Option<String>,
    /// Replaces the strategy resolved from `product_type`.
    pub base_strategy: Option<FetchStrategy>,
    /// Replaces the built-in channel set.
    pub channels: Option<Vec<Channel>>,
    /// Concurrent fetches per channel bucket.
    pub concurrency: usize,
}

impl CollectOptions {
    pub fn new(product_type: Option<&str>, concurrency: usize) -> Self {
        Self {
            product_type: product_type.map(str::to_string),
            concurrency,
            ..Self::default()
        }
    }

    fn strategy(&self) -> FetchStrategy {
        self.base_strategy
            .clone()
            .unwrap_or_else(|| resolve_strategy(self.product_type.as_deref()))
    }

    fn channels(&self) -> Vec<Channel> {
        self.channels
            .clone()
            .unwrap_or_else(|| channels_for_product_type(self.product_type.as_deref()))
    }
}

/// Routes URLs to channels and fetches them.
#[derive(Debug, Clone)]
pub struct Collector {
    fetcher: Fetcher,
}

impl Collector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new()?,
        })
    }

    pub fn with_fetcher(fetcher: Fetcher) -> Self {
        Self { fetcher }
    }

    /// Fetch `urls`, bucket by bucket in channel priority order.
    ///
    /// Each document is tagged with the channel it was routed through.
    /// URLs that fail every attempt are omitted.
    #[instrument(skip_all, fields(urls = urls.len(), product_type = ?opts.product_type))]
    pub async fn collect(&self, urls: &[String], opts: &CollectOptions) -> Vec<RawDocument> {
        let fallback = opts.strategy();
        let channels = opts.channels();
        let routed = route(urls, &channels);

        let mut documents = Vec::with_capacity(routed.total());
        for (name, bucket) in routed.iter() {
            if bucket.is_empty() {
                continue;
            }

            let strategy = channels
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.choose_strategy(&fallback))
                .unwrap_or(&fallback);

            let fetched = self.fetcher.fetch_many(bucket, strategy, opts.concurrency).await;
            info!(channel = name, requested = bucket.len(), fetched = fetched.len(), "channel collected");
            documents.extend(fetched.into_iter().map(|doc| doc.with_channel(name)));
        }

        documents
    }
}
