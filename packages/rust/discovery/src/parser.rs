//! Search-result page parser.
//!
//! Pulls absolute `href="http…"` targets out of a results page, skipping
//! links that point back at search engines (redirect wrappers, ads, etc.).

use std::sync::LazyLock;

use regex::Regex;

/// Hosts and prefixes whose links are search-engine plumbing, not results.
const SKIPPED_LINK_MARKERS: &[&str] = &["duckduckgo.com", "google.com/url", "yahoo.com"];

/// Matches absolute `href="http…"` targets; links carrying a fragment never match.
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r##"href="(http[^"#]+)""##).expect("href regex"));

/// Result links in page order, at most `limit`.
pub(crate) fn parse_links(html: &str, limit: usize) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
        .filter(|link| !SKIPPED_LINK_MARKERS.iter().any(|marker| link.contains(marker)))
        .take(limit)
        .collect()
}
