//! Strength/weakness extraction and per-document comparison rows.

use std::collections::HashMap;

use serde::Serialize;

use researcher_shared::{Document, Summary};

const POSITIVE_KEYWORDS: &[&str] = &[
    "advantage", "benefit", "fast", "improve", "robust", "strength", "优势", "优点", "亮点", "稳定",
    "提升",
];

const NEGATIVE_KEYWORDS: &[&str] = &[
    "risk", "concern", "slow", "缺点", "不足", "劣势", "风险", "延迟", "瓶颈",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightCategory {
    Strength,
    Weakness,
}

/// A summary bullet classified as a strength or weakness.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub category: InsightCategory,
    pub text: String,
    /// Title of the document the bullet came from (URL if unknown).
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Insights {
    pub strengths: Vec<Insight>,
    pub weaknesses: Vec<Insight>,
}

/// Positive keywords take precedence when a bullet has both.
fn classify(text: &str) -> Option<InsightCategory> {
    let lower = text.to_lowercase();
    if POSITIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some(InsightCategory::Strength)
    } else if NEGATIVE_KEYWORDS.iter().any(|k| lower.contains(k)) {
        Some(InsightCategory::Weakness)
    } else {
        None
    }
}

/// Classify summary bullets by keyword, keeping at most `limit_per_category`
/// of each. Categories with no matching bullet stay empty.
pub fn extract_insights(summaries: &[Summary], documents: &[Document], limit_per_category: usize) -> Insights {
    let title_by_url: HashMap<&str, &str> = documents.iter().map(|d| (d.url(), d.title())).collect();

    let mut insights = Insights::default();
    for summary in summaries {
        let source = title_by_url
            .get(summary.url.as_str())
            .filter(|title| !title.is_empty())
            .copied()
            .unwrap_or(summary.url.as_str());

        for bullet in &summary.bullet_points {
            let Some(category) = classify(bullet) else {
                continue;
            };
            let bucket = match category {
                InsightCategory::Strength => &mut insights.strengths,
                InsightCategory::Weakness => &mut insights.weaknesses,
            };
            if bucket.len() < limit_per_category {
                bucket.push(Insight {
                    category,
                    text: bullet.clone(),
                    source: source.to_string(),
                });
            }
        }
    }

    insights
}

/// One Markdown bullet per document (first `limit`), with channel, language
/// and the first summary point when available.
pub fn build_comparison_rows(documents: &[Document], summaries: &[Summary], limit: usize) -> Vec<String> {
    let first_point: HashMap<&str, &str> = summaries
        .iter()
        .filter_map(|s| s.bullet_points.first().map(|p| (s.url.as_str(), p.as_str())))
        .collect();

    documents
        .iter()
        .take(limit)
        .map(|doc| {
            let label = if doc.title().is_empty() { doc.url() } else { doc.title() };
            let mut parts = vec![label.to_string()];
            if let Some(channel) = doc.channel() {
                parts.push(format!("channel: {channel}"));
            }
            if let Some(language) = doc.language() {
                parts.push(format!("language: {language}"));
            }
            if let Some(point) = first_point.get(doc.url()) {
                parts.push(format!("key point: {point}"));
            }
            format!("- {}", parts.join(" | "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use researcher_shared::{NormalizedDocument, RawDocument};

    fn docs() -> Vec<Document> {
        let normalized = |url: &str, title: &str, channel: &str| {
            Document::from(NormalizedDocument {
                base: RawDocument::new(url, title, "content").with_channel(channel),
                language: Some("en".into()),
                source: Some("normalized".into()),
                normalized_at: Utc::now(),
            })
        };
        vec![
            normalized("https://example.com/a", "A 优势案例", "docs"),
            normalized("https://example.com/b", "B 缺点提示", "github"),
        ]
    }

    fn summaries() -> Vec<Summary> {
        vec![
            Summary::new("https://example.com/a", vec!["优势：fast response".into()]),
            Summary::new("https://example.com/b", vec!["存在风险 slow".into()]),
        ]
    }

    #[test]
    fn extracts_strengths_and_weaknesses() {
        let insights = extract_insights(&summaries(), &docs(), 5);

        assert_eq!(insights.strengths.len(), 1);
        assert_eq!(insights.strengths[0].source, "A 优势案例");
        assert_eq!(insights.weaknesses.len(), 1);
        assert_eq!(insights.weaknesses[0].category, InsightCategory::Weakness);
    }

    #[test]
    fn unmatched_categories_stay_empty() {
        let summaries = vec![Summary::new("https://example.com/a", vec!["Neutral point".into()])];
        let insights = extract_insights(&summaries, &docs(), 5);
        assert!(insights.strengths.is_empty());
        assert!(insights.weaknesses.is_empty());
    }

    #[test]
    fn limit_per_category_and_unknown_source() {
        let bullets = (0..4).map(|i| format!("fast path {i}")).collect();
        let summaries = vec![Summary::new("https://elsewhere.example", bullets)];
        let insights = extract_insights(&summaries, &docs(), 2);
        assert_eq!(insights.strengths.len(), 2);
        assert_eq!(insights.strengths[0].source, "https://elsewhere.example");
    }

    #[test]
    fn comparison_rows_carry_channel_language_and_point() {
        let rows = build_comparison_rows(&docs(), &summaries(), 5);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            "- A 优势案例 | channel: docs | language: en | key point: 优势：fast response"
        );

        let raw = vec![Document::from(RawDocument::new("https://r.example", "Raw", "x"))];
        assert_eq!(build_comparison_rows(&raw, &[], 5), ["- Raw"]);
    }
}
