//! Source discovery through a search engine's HTML results page.
//!
//! For every keyword × discovery channel, the channel's query template is
//! sent to the search endpoint and the result links are collected. A failed
//! query is skipped; discovery as a whole only fails if the HTTP client
//! cannot be built.

mod channels;
mod parser;

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use researcher_shared::{ResearchError, Result};

pub use channels::{DiscoveryChannel, discovery_channels_for, list_channel_names, merge_channels};

/// DuckDuckGo's script-free results page.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://duckduckgo.com/html/";

/// Maximum number of redirects to follow for a search request.
const MAX_REDIRECTS: usize = 3;

/// User-Agent string for discovery requests.
const USER_AGENT: &str = concat!("researcher/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Discovery options
// ---------------------------------------------------------------------------

/// Configuration for [`discover_sources`].
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Search endpoint; the query is sent as the `q` parameter.
    pub endpoint: String,
    pub limit_per_keyword: usize,
    pub limit_per_channel: usize,
    /// Timeout for each search request in seconds.
    pub timeout_secs: u64,
    /// Replaces the channels derived from the product type.
    pub channels: Option<Vec<DiscoveryChannel>>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            limit_per_keyword: 5,
            limit_per_channel: 3,
            timeout_secs: 10,
            channels: None,
        }
    }
}

impl DiscoveryOptions {
    /// Links kept per query.
    fn per_query_limit(&self) -> usize {
        self.limit_per_keyword.min(self.limit_per_channel)
    }
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Discover candidate source URLs for `keywords`.
///
/// Queries run sequentially, keyword-major. The result is de-duplicated with
/// first-seen order preserved.
#[instrument(skip_all, fields(keywords = keywords.len(), product_type = ?product_type))]
pub async fn discover_sources(
    keywords: &[String],
    product_type: Option<&str>,
    opts: &DiscoveryOptions,
) -> Result<Vec<String>> {
    let client = build_client(opts)?;
    let channels = opts
        .channels
        .clone()
        .unwrap_or_else(|| discovery_channels_for(product_type));
    let limit = opts.per_query_limit();

    let mut discovered: Vec<String> = Vec::new();
    for keyword in keywords {
        for channel in &channels {
            let query = channel.build_query(keyword);
            match search(&client, &opts.endpoint, &query).await {
                Ok(html) => {
                    let links = parser::parse_links(&html, limit);
                    debug!(channel = %channel.name, %query, links = links.len(), "search complete");
                    for link in links {
                        if !discovered.contains(&link) {
                            discovered.push(link);
                        }
                    }
                }
                Err(e) => {
                    warn!(channel = %channel.name, %query, error = %e, "search failed, skipping");
                }
            }
        }
    }

    info!(urls = discovered.len(), "discovery complete");
    Ok(discovered)
}

/// Read seed URLs from a file.
///
/// `.json` files hold an array of URLs; anything else is one URL per line.
/// Blank lines are ignored.
pub fn load_seed_list(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path).map_err(|e| ResearchError::io(path, e))?;

    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    if is_json {
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ResearchError::parse(format!("{}: {e}", path.display())))?;
        return match value {
            serde_json::Value::Array(items) => Ok(items
                .into_iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect()),
            _ => {
                warn!(path = %path.display(), "seed list JSON is not an array; ignoring");
                Ok(Vec::new())
            }
        };
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &DiscoveryOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| ResearchError::Network(format!("failed to build HTTP client: {e}")))
}

/// Run one search query and return the results page.
async fn search(client: &Client, endpoint: &str, query: &str) -> Result<String> {
    let url = Url::parse_with_params(endpoint, &[("q", query)])
        .map_err(|e| ResearchError::config(format!("invalid search endpoint {endpoint}: {e}")))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ResearchError::Network(format!("{endpoint}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ResearchError::Network(format!("{endpoint}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| ResearchError::Network(format!("{endpoint}: failed to read body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn results_page() -> String {
        std::fs::read_to_string("../../../fixtures/search/results.html").expect("read search fixture")
    }

    fn opts_for(server: &MockServer) -> DiscoveryOptions {
        DiscoveryOptions {
            endpoint: format!("{}/html/", server.uri()),
            ..DiscoveryOptions::default()
        }
    }

    #[tokio::test]
    async fn test_discover_dedupes_across_channels() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
            .mount(&server)
            .await;

        let keywords = vec!["wireless earbuds".to_string()];
        let urls = discover_sources(&keywords, None, &opts_for(&server)).await.unwrap();

        // Three base channels return the same page; per-query limit is 3.
        assert_eq!(
            urls,
            [
                "https://www.example.com/earbuds-review",
                "https://shop.example.org/item?id=42&ref=search",
                "https://blog.example.net/earbuds",
            ]
        );
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_discover_sends_channel_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html/"))
            .and(query_param("q", "qdrant documentation"))
            .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
            .expect(1)
            .mount(&server)
            .await;

        let opts = DiscoveryOptions {
            channels: Some(vec![DiscoveryChannel::new("docs", "{keyword} documentation", "docs")]),
            limit_per_keyword: 1,
            ..opts_for(&server)
        };
        let urls = discover_sources(&["qdrant".to_string()], None, &opts).await.unwrap();

        assert_eq!(urls, ["https://www.example.com/earbuds-review"]);
    }

    #[tokio::test]
    async fn test_discover_skips_failed_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "earbuds"))
            .respond_with(ResponseTemplate::new(200).set_body_string(results_page()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let urls = discover_sources(&["earbuds".to_string()], None, &opts_for(&server))
            .await
            .unwrap();

        // Only the "general" channel query succeeded.
        assert_eq!(urls.len(), 3);
    }

    #[test]
    fn test_load_seed_list_json_and_lines() {
        let dir = std::env::temp_dir().join(format!("researcher_seeds_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();

        let json = dir.join("seeds.json");
        std::fs::write(&json, r#"["https://a.example", "https://b.example"]"#).unwrap();
        assert_eq!(load_seed_list(&json).unwrap(), ["https://a.example", "https://b.example"]);

        let text = dir.join("seeds.txt");
        std::fs::write(&text, "https://a.example\n\n  https://c.example  \n").unwrap();
        assert_eq!(load_seed_list(&text).unwrap(), ["https://a.example", "https://c.example"]);

        let object = dir.join("object.json");
        std::fs::write(&object, r#"{"urls": []}"#).unwrap();
        assert!(load_seed_list(&object).unwrap().is_empty());
    }

    #[test]
    fn test_load_seed_list_missing_file() {
        let missing = std::env::temp_dir().join(format!("researcher_missing_{}.txt", Uuid::now_v7()));
        assert!(matches!(load_seed_list(&missing), Err(ResearchError::Io { .. })));
    }
}
