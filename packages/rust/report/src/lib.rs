//! Markdown research report built from stored documents and summaries.
//!
//! The report is assembled in one pass from whatever stage the documents
//! are at (normalized when available, raw otherwise); see [`build_report`].

mod insights;

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument};

use researcher_shared::{DEFAULT_CHANNEL, Document, ResearchError, Result, Summary};

pub use insights::{Insight, InsightCategory, Insights, build_comparison_rows, extract_insights};

/// Title used when the caller does not supply one.
pub const DEFAULT_REPORT_TITLE: &str = "Product Research Report";

/// Language bucket for documents without a language tag.
const UNKNOWN_LANGUAGE: &str = "unknown";

// ---------------------------------------------------------------------------
// Options / result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub title: String,
    /// Maximum entries in the Sources section.
    pub source_limit: usize,
    /// Maximum summary bullets in Key Highlights.
    pub highlight_limit: usize,
    /// Maximum document titles used when there are no summaries.
    pub fallback_highlight_limit: usize,
    pub insight_limit: usize,
    pub comparison_limit: usize,
    /// Fixed timestamp; defaults to now.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_REPORT_TITLE.to_string(),
            source_limit: 10,
            highlight_limit: 12,
            fallback_highlight_limit: 8,
            insight_limit: 5,
            comparison_limit: 5,
            generated_at: None,
        }
    }
}

impl ReportOptions {
    pub fn titled(title: Option<&str>) -> Self {
        Self {
            title: title.unwrap_or(DEFAULT_REPORT_TITLE).to_string(),
            ..Self::default()
        }
    }
}

/// A rendered report and the parts it was built from.
#[derive(Debug, Clone, Serialize)]
pub struct ReportResult {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub total_documents: usize,
    /// Distinct channels, sorted.
    pub channels: Vec<String>,
    /// Distinct languages, sorted.
    pub languages: Vec<String>,
    pub highlights: Vec<String>,
    pub insights: Insights,
    pub comparison: Vec<String>,
    pub sources: Vec<String>,
    pub markdown: String,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Build the Markdown report.
#[instrument(skip_all, fields(documents = documents.len(), summaries = summaries.len()))]
pub fn build_report(documents: &[Document], summaries: &[Summary], opts: &ReportOptions) -> ReportResult {
    let generated_at = opts.generated_at.unwrap_or_else(Utc::now);

    let channel_counts = count_by(documents, |d| d.channel().unwrap_or(DEFAULT_CHANNEL));
    let language_counts = count_by(documents, |d| d.language().unwrap_or(UNKNOWN_LANGUAGE));

    let mut highlights = aggregate_highlights(summaries, opts.highlight_limit);
    if highlights.is_empty() {
        highlights = fallback_highlights(documents, opts.fallback_highlight_limit);
    }

    let insights = extract_insights(summaries, documents, opts.insight_limit);
    let comparison = build_comparison_rows(documents, summaries, opts.comparison_limit);
    let sources = format_sources(documents, opts.source_limit);

    let mut lines: Vec<String> = vec![
        format!("# {}", opts.title),
        String::new(),
        format!(
            "_Generated at: {}_",
            generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
        String::new(),
        "## Coverage".into(),
        format!("- Total documents: {}", documents.len()),
        format!("- Distinct channels: {}", channel_counts.len()),
        format!("- Distinct languages: {}", language_counts.len()),
    ];

    section(&mut lines, "Channel Breakdown", &count_lines(&channel_counts), "- (none)");
    section(&mut lines, "Language Breakdown", &count_lines(&language_counts), "- (unknown)");
    section(&mut lines, "Key Highlights", &highlights, "- No summaries available");
    section(&mut lines, "Strengths", &insight_lines(&insights.strengths), "- None identified");
    section(&mut lines, "Weaknesses", &insight_lines(&insights.weaknesses), "- None identified");
    section(&mut lines, "Comparison", &comparison, "- (none)");
    section(&mut lines, "Sources", &sources, "- No sources available");
    lines.push(String::new());

    debug!(highlights = highlights.len(), sources = sources.len(), "report assembled");

    ReportResult {
        title: opts.title.clone(),
        generated_at,
        total_documents: documents.len(),
        channels: channel_counts.keys().map(|k| k.to_string()).collect(),
        languages: language_counts.keys().map(|k| k.to_string()).collect(),
        highlights,
        insights,
        comparison,
        sources,
        markdown: lines.join("\n"),
    }
}

/// Write the report's Markdown to `path`, creating parent directories.
pub fn write_report(path: &Path, report: &ReportResult) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ResearchError::io(parent, e))?;
    }
    std::fs::write(path, &report.markdown).map_err(|e| ResearchError::io(path, e))?;

    info!(path = %path.display(), "report written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn count_by<'a>(documents: &'a [Document], key: impl Fn(&'a Document) -> &'a str) -> BTreeMap<&'a str, usize> {
    let mut counts = BTreeMap::new();
    for doc in documents {
        *counts.entry(key(doc)).or_insert(0) += 1;
    }
    counts
}

fn count_lines(counts: &BTreeMap<&str, usize>) -> Vec<String> {
    counts.iter().map(|(name, count)| format!("- {name}: {count}")).collect()
}

fn section(lines: &mut Vec<String>, heading: &str, body: &[String], empty: &str) {
    lines.push(String::new());
    lines.push(format!("## {heading}"));
    if body.is_empty() {
        lines.push(empty.to_string());
    } else {
        lines.extend(body.iter().cloned());
    }
}

fn aggregate_highlights(summaries: &[Summary], limit: usize) -> Vec<String> {
    summaries
        .iter()
        .flat_map(|s| s.bullet_points.iter())
        .take(limit)
        .map(|bullet| format!("- {bullet}"))
        .collect()
}

fn fallback_highlights(documents: &[Document], limit: usize) -> Vec<String> {
    documents
        .iter()
        .take(limit)
        .map(|doc| format!("- {}", label(doc)))
        .collect()
}

fn insight_lines(insights: &[Insight]) -> Vec<String> {
    insights
        .iter()
        .map(|i| format!("- {} _(source: {})_", i.text, i.source))
        .collect()
}

fn format_sources(documents: &[Document], limit: usize) -> Vec<String> {
    documents
        .iter()
        .take(limit)
        .map(|doc| {
            let channel = doc.channel().unwrap_or(DEFAULT_CHANNEL);
            format!("- [{}]({}) _(channel: {channel})_", label(doc), doc.url())
        })
        .collect()
}

fn label(doc: &Document) -> &str {
    if doc.title().is_empty() { doc.url() } else { doc.title() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use researcher_shared::{NormalizedDocument, RawDocument};
    use uuid::Uuid;

    fn normalized(url: &str, title: &str, channel: &str) -> Document {
        Document::from(NormalizedDocument {
            base: RawDocument::new(url, title, format!("{title} content")).with_channel(channel),
            language: Some("en".into()),
            source: Some("normalized".into()),
            normalized_at: Utc::now(),
        })
    }

    fn sample_docs() -> Vec<Document> {
        vec![
            normalized("https://example.com/a", "Example A", "docs"),
            normalized("https://example.com/b", "Example B", "github"),
        ]
    }

    fn sample_summaries() -> Vec<Summary> {
        vec![
            Summary::new("https://example.com/a", vec!["Point A".into(), "Point B".into()]),
            Summary::new("https://example.com/b", vec!["Point C".into()]),
        ]
    }

    #[test]
    fn report_matches_snapshot() {
        let opts = ReportOptions {
            title: "Sample Report".into(),
            generated_at: Some(Utc.with_ymd_and_hms(2025, 2, 12, 12, 0, 0).unwrap()),
            ..ReportOptions::default()
        };
        let report = build_report(&sample_docs(), &sample_summaries(), &opts);

        let snapshot = std::fs::read_to_string("../../../fixtures/snapshots/report_sample.md")
            .expect("read report snapshot");
        assert_eq!(report.markdown.trim(), snapshot.trim());
    }

    #[test]
    fn report_exposes_parts() {
        let report = build_report(&sample_docs(), &sample_summaries(), &ReportOptions::titled(Some("Parts")));

        assert_eq!(report.title, "Parts");
        assert_eq!(report.total_documents, 2);
        assert_eq!(report.channels, ["docs", "github"]);
        assert_eq!(report.languages, ["en"]);
        assert_eq!(report.highlights.len(), 3);
        assert_eq!(report.sources.len(), 2);
    }

    #[test]
    fn raw_documents_fall_back_to_titles() {
        let raw = vec![Document::from(RawDocument::new("https://example.com/raw", "Raw Title", "Raw"))];
        let report = build_report(&raw, &[], &ReportOptions::titled(Some("Raw Report")));

        assert_eq!(report.total_documents, 1);
        assert_eq!(report.highlights, ["- Raw Title"]);
        assert_eq!(report.channels, [DEFAULT_CHANNEL]);
        assert_eq!(report.languages, [UNKNOWN_LANGUAGE]);
        assert!(report.markdown.contains("Raw Title"));
    }

    #[test]
    fn highlight_and_source_limits() {
        let docs: Vec<Document> = (0..15)
            .map(|i| normalized(&format!("https://example.com/{i}"), &format!("Doc {i}"), "docs"))
            .collect();
        let summaries: Vec<Summary> = (0..15)
            .map(|i| Summary::new(format!("https://example.com/{i}"), vec![format!("Point {i}")]))
            .collect();

        let report = build_report(&docs, &summaries, &ReportOptions::default());
        assert_eq!(report.highlights.len(), 12);
        assert_eq!(report.sources.len(), 10);
    }

    #[test]
    fn write_report_creates_directories() {
        let dir = std::env::temp_dir().join(format!("researcher_report_{}", Uuid::now_v7()));
        let path = dir.join("nested").join("report.md");

        let report = build_report(&sample_docs(), &sample_summaries(), &ReportOptions::default());
        write_report(&path, &report).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), report.markdown);
    }
}
