//! Bullet-point summaries: a sentence splitter, and a generated variant that
//! asks a [`TextGenerator`] for bullets.

use tracing::{debug, instrument, warn};

use researcher_shared::{Document, Summary};

use crate::generator::{GenerateOptions, TextGenerator};

/// Default bullets per summary.
pub const DEFAULT_MAX_POINTS: usize = 5;

/// Characters of content included in a generation prompt.
const PROMPT_CONTENT_LIMIT: usize = 1600;

const SUMMARY_MAX_TOKENS: u32 = 400;

const SYSTEM_PROMPT: &str = "You are a product research and market analysis assistant. \
    Extract concise key points from web page content.";

/// Characters that end a sentence when followed by whitespace.
const SENTENCE_ENDINGS: [char; 4] = ['。', '.', '!', '?'];

/// Split `text` after sentence-ending punctuation that is followed by
/// whitespace; returns at most `limit` non-empty sentences.
pub fn split_sentences(text: &str, limit: usize) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let at_boundary =
            SENTENCE_ENDINGS.contains(&c) && chars.peek().is_some_and(|next| next.is_whitespace());
        if at_boundary {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            push_trimmed(&mut sentences, &current);
            current.clear();
        }
    }
    push_trimmed(&mut sentences, &current);

    sentences.truncate(limit);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, sentence: &str) {
    let trimmed = sentence.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Summarize each document with the sentence splitter. Documents that yield
/// no sentences get no summary.
#[instrument(skip_all, fields(documents = docs.len()))]
pub fn summarize_documents(docs: &[Document], max_points: usize) -> Vec<Summary> {
    docs.iter()
        .filter_map(|doc| {
            let points = split_sentences(doc.content(), max_points);
            (!points.is_empty()).then(|| Summary::new(doc.url(), points))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Generated summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeneratedSummaryOptions {
    pub model: Option<String>,
    pub max_points: usize,
    /// Use the sentence splitter when generation fails instead of skipping.
    pub fallback_to_basic: bool,
}

impl Default for GeneratedSummaryOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_points: DEFAULT_MAX_POINTS,
            fallback_to_basic: true,
        }
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn summary_prompt(doc: &Document) -> String {
    format!(
        "List the key information of the following web page as bullet points, covering \
         product highlights, price and experience, user pain points or competitors.\n\
         Write one point per line and keep each short.\n\
         Title: {}\nURL: {}\nContent: {}",
        doc.title(),
        doc.url(),
        truncate_chars(doc.content(), PROMPT_CONTENT_LIMIT)
    )
}

/// Bullets from a generated response: one per non-empty line with any
/// `- ` / `* ` marker removed. Falls back to sentence splitting when the
/// response has no usable lines.
pub fn extract_bullets(text: &str, limit: usize) -> Vec<String> {
    let bullets: Vec<String> = text
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix("- ")
                .or_else(|| line.strip_prefix("* "))
                .unwrap_or(line)
        })
        .filter(|line| !line.is_empty())
        .take(limit)
        .map(str::to_string)
        .collect();

    if bullets.is_empty() {
        split_sentences(text, limit)
    } else {
        bullets
    }
}

/// Summarize each document with `generator`, one request per document.
#[instrument(skip_all, fields(documents = docs.len(), model = ?opts.model))]
pub async fn summarize_documents_generated(
    docs: &[Document],
    generator: &dyn TextGenerator,
    opts: &GeneratedSummaryOptions,
) -> Vec<Summary> {
    let gen_opts = GenerateOptions {
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        model: opts.model.clone(),
        max_tokens: Some(SUMMARY_MAX_TOKENS),
    };

    let mut summaries = Vec::with_capacity(docs.len());
    for doc in docs {
        let points = match generator.generate(&summary_prompt(doc), &gen_opts).await {
            Ok(response) => extract_bullets(&response, opts.max_points),
            Err(e) if opts.fallback_to_basic => {
                warn!(url = doc.url(), error = %e, "generation failed, using sentence splitter");
                split_sentences(doc.content(), opts.max_points)
            }
            Err(e) => {
                warn!(url = doc.url(), error = %e, "generation failed, skipping document");
                continue;
            }
        };

        if !points.is_empty() {
            summaries.push(Summary::new(doc.url(), points));
        }
    }

    debug!(summaries = summaries.len(), "generated summaries complete");
    summaries
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use async_trait::async_trait;
    use researcher_shared::{RawDocument, ResearchError, Result};

    /// Replies with a fixed response (or fails) and records prompts.
    struct Canned {
        reply: Option<&'static str>,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(reply: Option<&'static str>) -> Self {
            Self {
                reply,
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str, _opts: &GenerateOptions) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply
                .map(str::to_string)
                .ok_or_else(|| ResearchError::Service("unavailable".into()))
        }
    }

    fn doc(content: &str) -> Document {
        Document::from(RawDocument::new("https://example.com", "Example", content))
    }

    #[test]
    fn splits_on_terminators_followed_by_whitespace() {
        let sentences = split_sentences("First point. Second point! Third? v1.2 is out。 第二句", 5);
        assert_eq!(
            sentences,
            ["First point.", "Second point!", "Third?", "v1.2 is out。", "第二句"]
        );
    }

    #[test]
    fn respects_limit() {
        assert_eq!(split_sentences("A. B. C. D.", 2), ["A.", "B."]);
        assert!(split_sentences("   ", 5).is_empty());
    }

    #[test]
    fn basic_summaries_skip_empty_documents() {
        let summaries = summarize_documents(&[doc("One. Two."), doc("")], DEFAULT_MAX_POINTS);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].bullet_points, ["One.", "Two."]);
    }

    #[test]
    fn bullets_strip_markers() {
        let bullets = extract_bullets("- fast\n* light\n\nplain line\n", 5);
        assert_eq!(bullets, ["fast", "light", "plain line"]);
        assert_eq!(extract_bullets("a\nb\nc", 2), ["a", "b"]);
    }

    #[test]
    fn prompt_truncates_long_content() {
        let long = "x".repeat(2000);
        let prompt = summary_prompt(&doc(&long));
        assert!(prompt.ends_with(&format!("{}...", "x".repeat(1600))));
    }

    #[tokio::test]
    async fn generated_summaries_use_response_bullets() {
        let generator = Canned::new(Some("- Point A\n- Point B"));
        let summaries =
            summarize_documents_generated(&[doc("ignored.")], &generator, &GeneratedSummaryOptions::default()).await;

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].bullet_points, ["Point A", "Point B"]);
        assert!(generator.prompts.lock().unwrap()[0].contains("URL: https://example.com"));
    }

    #[tokio::test]
    async fn generation_failure_falls_back_or_skips() {
        let generator = Canned::new(None);
        let docs = [doc("Fallback one. Fallback two.")];

        let with_fallback =
            summarize_documents_generated(&docs, &generator, &GeneratedSummaryOptions::default()).await;
        assert_eq!(with_fallback[0].bullet_points, ["Fallback one.", "Fallback two."]);

        let opts = GeneratedSummaryOptions {
            fallback_to_basic: false,
            ..GeneratedSummaryOptions::default()
        };
        assert!(summarize_documents_generated(&docs, &generator, &opts).await.is_empty());
    }
}
