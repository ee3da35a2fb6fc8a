//! Raw → normalized document transformation.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, instrument};

use researcher_shared::{NORMALIZED_SOURCE, NormalizedDocument, RawDocument};

/// Separator between the de-duplicated lines of normalized content.
const LINE_SEPARATOR: &str = " \n ";

/// `zh` if the text contains a CJK unified ideograph, else `en`.
pub fn detect_language(text: &str) -> &'static str {
    if text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c)) {
        "zh"
    } else {
        "en"
    }
}

fn compact_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Line boundaries: `\n`, `\r`, vertical tab, form feed, the C1/Unicode
/// separators. `\r\n` yields an empty piece, which is dropped anyway.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Compact each line, drop blank lines and exact repeats (first wins).
fn dedupe_lines(text: &str) -> String {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for line in text.split(is_line_break).map(compact_spaces) {
        if line.is_empty() || !seen.insert(line.clone()) {
            continue;
        }
        unique.push(line);
    }
    unique.join(LINE_SEPARATOR)
}

/// Normalize one document; `None` when its content cleans to nothing.
pub fn normalize_document(doc: &RawDocument) -> Option<NormalizedDocument> {
    let content = dedupe_lines(&doc.content);
    if content.is_empty() {
        return None;
    }

    let title = match compact_spaces(&doc.title) {
        t if t.is_empty() => doc.url.clone(),
        t => t,
    };

    Some(NormalizedDocument {
        base: RawDocument {
            url: doc.url.clone(),
            title,
            content: content.clone(),
            fetched_at: doc.fetched_at,
            channel: doc.channel.clone(),
        },
        language: Some(detect_language(&content).to_string()),
        source: Some(NORMALIZED_SOURCE.to_string()),
        normalized_at: Utc::now(),
    })
}

/// Normalize a batch, skipping documents with empty content.
#[instrument(skip_all, fields(documents = docs.len()))]
pub fn normalize_documents(docs: &[RawDocument]) -> Vec<NormalizedDocument> {
    let normalized: Vec<_> = docs.iter().filter_map(normalize_document).collect();
    debug!(
        normalized = normalized.len(),
        skipped = docs.len() - normalized.len(),
        "normalization complete"
    );
    normalized
}
