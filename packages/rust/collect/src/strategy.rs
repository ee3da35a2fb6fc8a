//! Per-request fetch parameters and their product-type defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User-Agent sent when a strategy does not override it.
pub const DEFAULT_USER_AGENT: &str = concat!("researcher/", env!("CARGO_PKG_VERSION"));

/// Parameters governing one fetch: timeout, retry budget, delay and headers.
///
/// A value type: channels carry their own instance, which replaces the
/// caller's strategy outright rather than being merged field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchStrategy {
    pub user_agent: String,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: f64,
    /// Retries after the first attempt; `max_retries + 1` attempts total.
    pub max_retries: u32,
    /// Sleep between failed attempts, in seconds.
    pub retry_delay_secs: f64,
    /// Extra request headers. Applied after `User-Agent`, so they win.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchStrategy {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10.0,
            max_retries: 1,
            retry_delay_secs: 0.0,
            headers: BTreeMap::new(),
        }
    }
}

impl FetchStrategy {
    /// Default strategy with the given timeout/retry/delay triple.
    pub fn tuned(timeout_secs: f64, max_retries: u32, retry_delay_secs: f64) -> Self {
        Self {
            timeout_secs,
            max_retries,
            retry_delay_secs,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs.max(0.0))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay_secs.max(0.0))
    }

    /// Total attempts this strategy allows per URL.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// `User-Agent` followed by the extra headers.
    pub fn request_headers(&self) -> BTreeMap<String, String> {
        let mut merged = BTreeMap::new();
        merged.insert("User-Agent".to_string(), self.user_agent.clone());
        merged.extend(self.headers.clone());
        merged
    }

    /// Apply explicit caller overrides (e.g. CLI flags) on top of this strategy.
    pub fn with_overrides(
        mut self,
        user_agent: Option<&str>,
        timeout_secs: Option<f64>,
        max_retries: Option<u32>,
        retry_delay_secs: Option<f64>,
    ) -> Self {
        if let Some(ua) = user_agent.filter(|ua| !ua.is_empty()) {
            self.user_agent = ua.to_string();
        }
        if let Some(timeout) = timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(retries) = max_retries {
            self.max_retries = retries;
        }
        if let Some(delay) = retry_delay_secs {
            self.retry_delay_secs = delay;
        }
        self
    }
}

/// Product category used to tune fetch behavior and channel sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductCategory {
    Consumer,
    Software,
    B2b,
    Other,
}

impl ProductCategory {
    /// Classify a free-form product type (case-insensitive, trimmed).
    pub fn parse(product_type: Option<&str>) -> Self {
        let normalized = product_type.unwrap_or("").trim().to_lowercase();
        match normalized.as_str() {
            "consumer" | "hardware" | "gadget" => Self::Consumer,
            "software" | "saas" => Self::Software,
            "b2b" | "enterprise" => Self::B2b,
            _ => Self::Other,
        }
    }
}

/// Return the default strategy for a product type.
///
/// Consumer sites get a short timeout, software sites a medium one, and B2B
/// sites the longest timeout with the most retries and the longest delay,
/// since they tend to throttle aggressively.
pub fn resolve_strategy(product_type: Option<&str>) -> FetchStrategy {
    match ProductCategory::parse(product_type) {
        ProductCategory::Consumer => FetchStrategy::tuned(8.0, 2, 0.5),
        ProductCategory::Software => FetchStrategy::tuned(12.0, 2, 0.3),
        ProductCategory::B2b => FetchStrategy::tuned(15.0, 3, 1.0),
        ProductCategory::Other => FetchStrategy::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_scale_with_product_type() {
        let consumer = resolve_strategy(Some("consumer"));
        let software = resolve_strategy(Some("software"));
        let b2b = resolve_strategy(Some("b2b"));

        assert!(consumer.timeout_secs < software.timeout_secs);
        assert!(software.timeout_secs < b2b.timeout_secs);
        assert!(b2b.max_retries > consumer.max_retries);
        assert!(b2b.retry_delay_secs >= 1.0);
    }

    #[test]
    fn product_type_aliases_and_case() {
        assert_eq!(resolve_strategy(Some("  SaaS ")), resolve_strategy(Some("software")));
        assert_eq!(resolve_strategy(Some("Enterprise")), resolve_strategy(Some("b2b")));
        assert_eq!(resolve_strategy(Some("gadget")), resolve_strategy(Some("consumer")));
        assert_eq!(resolve_strategy(None), FetchStrategy::default());
        assert_eq!(resolve_strategy(Some("furniture")), FetchStrategy::default());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let strategy =
            resolve_strategy(Some("b2b")).with_overrides(Some("custom"), Some(5.0), Some(4), Some(0.2));
        assert_eq!(strategy.user_agent, "custom");
        assert_eq!(strategy.timeout_secs, 5.0);
        assert_eq!(strategy.max_retries, 4);
        assert_eq!(strategy.retry_delay_secs, 0.2);

        let untouched = resolve_strategy(Some("b2b")).with_overrides(None, None, None, None);
        assert_eq!(untouched, resolve_strategy(Some("b2b")));
    }

    #[test]
    fn extra_headers_win_over_user_agent() {
        let mut strategy = FetchStrategy::default();
        strategy.headers.insert("Accept-Language".into(), "zh-CN".into());
        strategy.headers.insert("User-Agent".into(), "override/1.0".into());

        let headers = strategy.request_headers();
        assert_eq!(headers["User-Agent"], "override/1.0");
        assert_eq!(headers["Accept-Language"], "zh-CN");
    }

    #[test]
    fn attempts_include_first_try() {
        assert_eq!(FetchStrategy::tuned(1.0, 0, 0.0).attempts(), 1);
        assert_eq!(FetchStrategy::tuned(1.0, 3, 0.0).attempts(), 4);
    }
}
