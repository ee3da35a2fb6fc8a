//! Single-URL fetching with bounded retries, and ordered concurrent fan-out.
//!
//! The per-URL outcome is a typed [`FetchFailure`] internally; it is only
//! collapsed to "omit from batch" at [`Fetcher::fetch_one`] /
//! [`Fetcher::fetch_many`], so a failing URL never fails its batch.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

use researcher_shared::{RawDocument, ResearchError, Result};

use crate::extract::{extract_title, strip_markup};
use crate::strategy::FetchStrategy;

/// Maximum redirects followed per request.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Failure types
// ---------------------------------------------------------------------------

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FailureReason {
    /// Connection, DNS, TLS or other transport failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The strategy's per-attempt timeout elapsed.
    #[error("timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The body could not be read or decoded.
    #[error("body read failed: {0}")]
    Body(String),
}

/// A URL that exhausted its retry budget.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{url}: {reason} (after {attempts} attempt(s))")]
pub struct FetchFailure {
    pub url: String,
    pub attempts: u32,
    /// Reason of the last attempt.
    pub reason: FailureReason,
}

fn classify(err: &reqwest::Error) -> FailureReason {
    if err.is_timeout() {
        FailureReason::Timeout
    } else {
        FailureReason::Request(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// HTTP document fetcher. Cheap to clone (shares the connection pool).
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with a fresh HTTP client. Timeouts and headers come
    /// from the strategy on each request.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| ResearchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// One GET attempt, returning the decoded body.
    async fn attempt(&self, url: &str, strategy: &FetchStrategy) -> std::result::Result<String, FailureReason> {
        let response = self
            .client
            .get(url)
            .headers(header_map(strategy))
            .timeout(strategy.timeout())
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FailureReason::Status(status.as_u16()));
        }

        response.text().await.map_err(|e| {
            if e.is_timeout() {
                FailureReason::Timeout
            } else {
                FailureReason::Body(e.to_string())
            }
        })
    }

    /// Fetch `url` with up to `max_retries + 1` attempts, sleeping
    /// `retry_delay` between failed attempts.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn try_fetch(
        &self,
        url: &str,
        strategy: &FetchStrategy,
    ) -> std::result::Result<RawDocument, FetchFailure> {
        let attempts = strategy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(url, strategy).await {
                Ok(html) => {
                    debug!(attempt, bytes = html.len(), "fetched");
                    let title = extract_title(&html).unwrap_or_else(|| url.to_string());
                    return Ok(RawDocument::new(url, title, strip_markup(&html)));
                }
                Err(reason) if attempt >= attempts => {
                    return Err(FetchFailure {
                        url: url.to_string(),
                        attempts: attempt,
                        reason,
                    });
                }
                Err(reason) => {
                    debug!(attempt, %reason, "attempt failed, retrying");
                    let delay = strategy.retry_delay();
                    if delay > Duration::ZERO {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }

    /// Fetch `url`, returning `None` instead of an error once retries are spent.
    pub async fn fetch_one(&self, url: &str, strategy: &FetchStrategy) -> Option<RawDocument> {
        match self.try_fetch(url, strategy).await {
            Ok(doc) => Some(doc),
            Err(failure) => {
                warn!(
                    url = %failure.url,
                    attempts = failure.attempts,
                    reason = %failure.reason,
                    "dropping URL after failed fetch"
                );
                None
            }
        }
    }

    /// Fetch `urls` with at most `max(1, concurrency)` requests in flight.
    ///
    /// Output order matches input order regardless of completion order;
    /// failed URLs are omitted.
    #[instrument(skip_all, fields(urls = urls.len(), concurrency))]
    pub async fn fetch_many(
        &self,
        urls: &[String],
        strategy: &FetchStrategy,
        concurrency: usize,
    ) -> Vec<RawDocument> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let strategy = Arc::new(strategy.clone());

        // Handles are joined in spawn order, which is what keeps the output ordered.
        let handles: Vec<_> = urls
            .iter()
            .map(|url| {
                let fetcher = self.clone();
                let sem = semaphore.clone();
                let strategy = strategy.clone();
                let url = url.clone();
                tokio::spawn(async move {
                    let _permit = sem.acquire_owned().await.ok()?;
                    fetcher.fetch_one(&url, &strategy).await
                })
            })
            .collect();

        let mut documents = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(doc)) => documents.push(doc),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "fetch task aborted"),
            }
        }

        debug!(fetched = documents.len(), requested = urls.len(), "batch complete");
        documents
    }
}

/// Build request headers from the strategy, skipping invalid entries.
fn header_map(strategy: &FetchStrategy) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in strategy.request_headers() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "skipping invalid header"),
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn quick(max_retries: u32) -> FetchStrategy {
        FetchStrategy::tuned(5.0, max_retries, 0.0)
    }

    #[tokio::test]
    async fn retries_once_then_succeeds() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>ok</title><p>content</p>"))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let url = format!("{}/flaky", server.uri());
        let docs = fetcher.fetch_many(&[url.clone()], &quick(1), 1).await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].url, url);
        assert_eq!(docs[0].title, "ok");
        assert_eq!(docs[0].content, "ok content");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_report_reason_and_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let url = format!("{}/down", server.uri());
        let failure = fetcher.try_fetch(&url, &quick(2)).await.unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.reason, FailureReason::Status(503));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);

        // The public boundary swallows the failure.
        assert!(fetcher.fetch_one(&url, &quick(0)).await.is_none());
    }

    #[tokio::test]
    async fn timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new().unwrap();
        let strategy = FetchStrategy::tuned(0.2, 0, 0.0);
        let failure = fetcher
            .try_fetch(&format!("{}/slow", server.uri()), &strategy)
            .await
            .unwrap_err();

        assert_eq!(failure.reason, FailureReason::Timeout);
        assert_eq!(failure.attempts, 1);
    }

    #[tokio::test]
    async fn output_order_matches_input_order() {
        let server = MockServer::start().await;
        for (name, delay_ms) in [("a", 400), ("b", 200), ("c", 0)] {
            Mock::given(path(format!("/{name}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(format!("<title>{name}</title>"))
                        .set_delay(Duration::from_millis(delay_ms)),
                )
                .mount(&server)
                .await;
        }

        let urls: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|n| format!("{}/{n}", server.uri()))
            .collect();
        let docs = Fetcher::new().unwrap().fetch_many(&urls, &quick(0), 3).await;

        let titles: Vec<&str> = docs.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failed_urls_are_omitted_without_placeholders() {
        let server = MockServer::start().await;
        Mock::given(path("/good"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>fine</p>"))
            .mount(&server)
            .await;
        Mock::given(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let good = format!("{}/good", server.uri());
        let urls = vec![format!("{}/missing", server.uri()), good.clone()];
        // Zero concurrency is treated as one worker.
        let docs = Fetcher::new().unwrap().fetch_many(&urls, &quick(0), 0).await;

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].url, good);
        // No <title>: the URL stands in.
        assert_eq!(docs[0].title, good);
    }

    #[tokio::test]
    async fn strategy_headers_are_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "custom-agent/1.0"))
            .and(header("x-research", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>h</title>"))
            .expect(1)
            .mount(&server)
            .await;

        let mut strategy = quick(0).with_overrides(Some("custom-agent/1.0"), None, None, None);
        strategy.headers.insert("X-Research".into(), "yes".into());

        let doc = Fetcher::new()
            .unwrap()
            .fetch_one(&format!("{}/h", server.uri()), &strategy)
            .await;
        assert!(doc.is_some());
    }
}
