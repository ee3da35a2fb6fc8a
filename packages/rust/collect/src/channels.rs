//! Channel definitions and URL routing.
//!
//! A channel groups URLs that share fetch characteristics (e.g. e-commerce
//! sites that throttle, documentation hosts that don't). Channels are tried
//! in priority order; the first one whose pattern matches wins, and anything
//! left over lands in the default fallback channel.

use url::Url;

use researcher_shared::DEFAULT_CHANNEL;

use crate::strategy::{FetchStrategy, ProductCategory};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A named routing bucket with an optional strategy override.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    /// Patterns containing a `.` match the host; others match the whole URL.
    pub patterns: Vec<String>,
    /// Replaces the caller's strategy for this channel's URLs.
    pub strategy: Option<FetchStrategy>,
    /// Receives every URL no other channel matches.
    pub is_default: bool,
}

impl Channel {
    pub fn new(name: impl Into<String>, patterns: &[&str]) -> Self {
        Self {
            name: name.into(),
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
            strategy: None,
            is_default: false,
        }
    }

    /// The catch-all channel.
    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            patterns: Vec::new(),
            strategy: None,
            is_default: true,
        }
    }

    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Whether any pattern matches `url`.
    pub fn matches(&self, url: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }

        let lowered = url.to_lowercase();
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_default();

        self.patterns.iter().any(|pattern| {
            if is_domain_pattern(pattern) {
                host.contains(pattern.as_str())
            } else {
                lowered.contains(pattern.as_str())
            }
        })
    }

    /// The strategy to fetch this channel with.
    pub fn choose_strategy<'a>(&'a self, fallback: &'a FetchStrategy) -> &'a FetchStrategy {
        self.strategy.as_ref().unwrap_or(fallback)
    }
}

fn is_domain_pattern(pattern: &str) -> bool {
    pattern.contains('.')
}

// ---------------------------------------------------------------------------
// Built-in channel sets
// ---------------------------------------------------------------------------

fn ecommerce() -> Channel {
    Channel::new("ecommerce", &["jd.com", "taobao.com", "tmall.com", "amazon.com"])
        .with_strategy(FetchStrategy::tuned(10.0, 2, 0.5))
}

fn reviews() -> Channel {
    Channel::new("reviews", &["zhihu.com", "weibo.com", "youtube.com", "bilibili.com"])
        .with_strategy(FetchStrategy::tuned(10.0, 1, 0.2))
}

fn docs() -> Channel {
    Channel::new("docs", &["readthedocs.io", "docs", "manual", "developer"])
        .with_strategy(FetchStrategy::tuned(12.0, 2, 0.3))
}

fn github() -> Channel {
    Channel::new("github", &["github.com"]).with_strategy(FetchStrategy::tuned(12.0, 1, 0.2))
}

fn analyst_reports() -> Channel {
    Channel::new(
        "analyst_reports",
        &["gartner.com", "forrester.com", "g2.com", "crunchbase.com"],
    )
    .with_strategy(FetchStrategy::tuned(18.0, 3, 1.0))
}

fn case_studies() -> Channel {
    Channel::new(
        "case_studies",
        &["case-study", "customers", "success-story", "whitepaper"],
    )
    .with_strategy(FetchStrategy::tuned(15.0, 2, 0.8))
}

/// Channels for a product type, in priority order, ending with the fallback.
pub fn channels_for_product_type(product_type: Option<&str>) -> Vec<Channel> {
    let general = Channel::fallback(DEFAULT_CHANNEL);
    match ProductCategory::parse(product_type) {
        ProductCategory::Consumer => vec![ecommerce(), reviews(), general],
        ProductCategory::Software => vec![docs(), github(), general],
        ProductCategory::B2b => vec![analyst_reports(), case_studies(), general],
        ProductCategory::Other => vec![general],
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// URLs grouped by channel, buckets in channel priority order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutedUrls {
    buckets: Vec<(String, Vec<String>)>,
}

impl RoutedUrls {
    /// URLs routed to `channel` (empty if the channel is unknown).
    pub fn get(&self, channel: &str) -> &[String] {
        self.buckets
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, urls)| urls.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate `(channel, urls)` in priority order, empty buckets included.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.buckets
            .iter()
            .map(|(name, urls)| (name.as_str(), urls.as_slice()))
    }

    /// Total URLs across all buckets.
    pub fn total(&self) -> usize {
        self.buckets.iter().map(|(_, urls)| urls.len()).sum()
    }

    fn bucket_mut(&mut self, channel: &str) -> &mut Vec<String> {
        let idx = match self.buckets.iter().position(|(name, _)| name == channel) {
            Some(idx) => idx,
            None => {
                self.buckets.push((channel.to_string(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[idx].1
    }
}

/// Name of the channel that receives unmatched URLs.
fn fallback_name(channels: &[Channel]) -> &str {
    channels
        .iter()
        .find(|c| c.is_default)
        .or_else(|| channels.last())
        .map(|c| c.name.as_str())
        .unwrap_or(DEFAULT_CHANNEL)
}

/// Assign every URL to exactly one channel.
///
/// Pure: the first channel (in slice order) whose pattern matches wins;
/// unmatched URLs go to the channel flagged `is_default`, else the last
/// channel, else an implicit `general` bucket.
pub fn route<S: AsRef<str>>(urls: &[S], channels: &[Channel]) -> RoutedUrls {
    let mut routed = RoutedUrls::default();
    for channel in channels {
        routed.bucket_mut(&channel.name);
    }

    let fallback = fallback_name(channels);
    for url in urls {
        let url = url.as_ref();
        let target = channels
            .iter()
            .find(|c| c.matches(url))
            .map(|c| c.name.as_str())
            .unwrap_or(fallback);
        routed.bucket_mut(target).push(url.to_string());
    }

    routed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_urls_route_to_specialized_channels() {
        let channels = channels_for_product_type(Some("consumer"));
        let routed = route(
            &[
                "https://item.jd.com/123.html",
                "https://www.bilibili.com/video/abc",
                "https://unknown.example.com/page",
            ],
            &channels,
        );

        assert_eq!(routed.get("ecommerce"), ["https://item.jd.com/123.html"]);
        assert_eq!(routed.get("reviews"), ["https://www.bilibili.com/video/abc"]);
        assert_eq!(routed.get("general"), ["https://unknown.example.com/page"]);
    }

    #[test]
    fn every_url_lands_in_exactly_one_bucket() {
        let urls = [
            "https://item.jd.com/1",
            "https://docs.github.com/en",
            "not a url at all",
            "https://www.amazon.com/dp/B0",
            "https://unknown.example.com",
        ];
        for product in [None, Some("consumer"), Some("software"), Some("b2b")] {
            let routed = route(&urls, &channels_for_product_type(product));
            assert_eq!(routed.total(), urls.len(), "product type {product:?}");
            for url in urls {
                let hits = routed.iter().filter(|(_, bucket)| bucket.contains(&url.to_string())).count();
                assert_eq!(hits, 1, "{url} routed {hits} times");
            }
        }
    }

    #[test]
    fn first_matching_channel_wins() {
        // docs.github.com matches both "docs" (keyword) and "github.com" (domain).
        let channels = channels_for_product_type(Some("software"));
        let routed = route(&["https://docs.github.com/en/actions"], &channels);
        assert_eq!(routed.get("docs").len(), 1);
        assert!(routed.get("github").is_empty());
    }

    #[test]
    fn keyword_patterns_match_path_domain_patterns_match_host() {
        let case_studies = case_studies();
        assert!(case_studies.matches("https://vendor.example.com/customers/acme"));

        let analyst = analyst_reports();
        assert!(analyst.matches("https://www.G2.com/products/x"));
        assert!(!analyst.matches("https://example.com/?ref=g2.com"));
    }

    #[test]
    fn buckets_preserve_priority_and_url_order() {
        let channels = channels_for_product_type(Some("consumer"));
        let routed = route(
            &["https://a.example.com", "https://jd.com/2", "https://b.example.com", "https://jd.com/1"],
            &channels,
        );

        let names: Vec<&str> = routed.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["ecommerce", "reviews", "general"]);
        assert_eq!(routed.get("ecommerce"), ["https://jd.com/2", "https://jd.com/1"]);
        assert_eq!(routed.get("general"), ["https://a.example.com", "https://b.example.com"]);
    }

    #[test]
    fn fallback_without_flag_is_last_channel() {
        let channels = vec![Channel::new("special", &["example.com"]), Channel::new("rest", &["nothing.invalid"])];
        let routed = route(&["https://other.org"], &channels);
        assert_eq!(routed.get("rest"), ["https://other.org"]);
    }

    #[test]
    fn empty_channel_list_routes_to_general() {
        let routed = route(&["https://example.com"], &[]);
        assert_eq!(routed.get(DEFAULT_CHANNEL), ["https://example.com"]);
    }

    #[test]
    fn channel_strategy_overrides_fallback_outright() {
        let fallback = FetchStrategy::tuned(1.0, 1, 0.0);
        let channel = Channel::new("special", &["example.com"]).with_strategy(FetchStrategy::tuned(99.0, 0, 0.0));
        assert_eq!(channel.choose_strategy(&fallback).timeout_secs, 99.0);
        assert_eq!(channel.choose_strategy(&fallback).max_retries, 0);

        let general = Channel::fallback("general");
        assert_eq!(general.choose_strategy(&fallback), &fallback);
    }
}
