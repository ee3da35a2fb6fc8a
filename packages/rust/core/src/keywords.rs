//! Search keyword expansion from a free-text product brief.

use tracing::{info, instrument};

use researcher_shared::{ResearchError, Result};

use crate::generator::{GenerateOptions, TextGenerator};

pub const DEFAULT_MAX_KEYWORDS: usize = 8;

const KEYWORD_MAX_TOKENS: u32 = 128;

const SYSTEM_PROMPT: &str = "You are a product research assistant. Generate search keywords \
    from the product brief, one phrase per line.";

/// One keyword per non-empty line, list markers stripped, first `limit`
/// lines, then de-duplicated in order.
pub fn parse_keywords(text: &str, limit: usize) -> Vec<String> {
    let parsed = text
        .lines()
        .map(|line| line.trim_start_matches(['-', '*', '•', ' ']).trim())
        .filter(|line| !line.is_empty())
        .take(limit);

    let mut keywords: Vec<String> = Vec::new();
    for keyword in parsed {
        if !keywords.iter().any(|k| k == keyword) {
            keywords.push(keyword.to_string());
        }
    }
    keywords
}

fn keyword_prompt(brief: &str, seeds: &[String]) -> String {
    let mut prompt = format!(
        "Based on the product brief below, list search keywords that highlight the product \
         name, core features, competitors and usage scenarios.\n\
         One phrase per line, 3 to 6 words each.\n\
         Product brief: {brief}\n"
    );
    if !seeds.is_empty() {
        prompt.push_str(&format!("Existing keywords for reference: {}\n", seeds.join(", ")));
    }
    prompt
}

/// Ask `generator` for up to `max_keywords` search phrases for `brief`.
#[instrument(skip_all, fields(seeds = seeds.len()))]
pub async fn generate_keywords_from_brief(
    brief: &str,
    seeds: &[String],
    generator: &dyn TextGenerator,
    model: Option<&str>,
    max_keywords: usize,
) -> Result<Vec<String>> {
    let opts = GenerateOptions {
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        model: model.map(str::to_string),
        max_tokens: Some(KEYWORD_MAX_TOKENS),
    };
    let response = generator.generate(&keyword_prompt(brief, seeds), &opts).await?;
    let keywords = parse_keywords(&response, max_keywords);

    info!(generated = keywords.len(), "keywords generated from brief");
    Ok(keywords)
}

/// Seed keywords followed by brief-generated ones, de-duplicated in order.
///
/// Fails when the result is empty, or when generation fails for a brief.
pub async fn prepare_keywords(
    seeds: &[String],
    brief: Option<&str>,
    generator: &dyn TextGenerator,
    model: Option<&str>,
) -> Result<Vec<String>> {
    let mut keywords: Vec<String> = Vec::new();
    let mut push = |k: &str| {
        if !keywords.iter().any(|existing| existing == k) {
            keywords.push(k.to_string());
        }
    };

    for seed in seeds {
        push(seed);
    }

    if let Some(brief) = brief.filter(|b| !b.trim().is_empty()) {
        let generated =
            generate_keywords_from_brief(brief, seeds, generator, model, DEFAULT_MAX_KEYWORDS).await?;
        for keyword in &generated {
            push(keyword);
        }
    }

    if keywords.is_empty() {
        return Err(ResearchError::validation("no keywords provided for discovery"));
    }
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, prompt: &str, _opts: &GenerateOptions) -> Result<String> {
            assert!(prompt.contains("Product brief:"));
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _prompt: &str, _opts: &GenerateOptions) -> Result<String> {
            Err(ResearchError::Service("offline".into()))
        }
    }

    #[test]
    fn parses_markers_and_dedupes() {
        let keywords = parse_keywords("- noise cancelling earbuds\n* earbuds\n• earbuds\n\n  long battery  ", 8);
        assert_eq!(keywords, ["noise cancelling earbuds", "earbuds", "long battery"]);
    }

    #[test]
    fn limit_applies_to_lines() {
        let text = (0..12).map(|i| format!("kw {i}")).collect::<Vec<_>>().join("\n");
        assert_eq!(parse_keywords(&text, DEFAULT_MAX_KEYWORDS).len(), 8);
    }

    #[tokio::test]
    async fn generated_keywords_follow_seeds() {
        let seeds = vec!["earbuds".to_string()];
        let keywords = prepare_keywords(&seeds, Some("wireless earbuds"), &Canned("- earbuds\n- anc earbuds"), None)
            .await
            .unwrap();
        assert_eq!(keywords, ["earbuds", "anc earbuds"]);
    }

    #[tokio::test]
    async fn seeds_alone_skip_generation() {
        let seeds = vec!["a".to_string(), "a".to_string(), "b".to_string()];
        let keywords = prepare_keywords(&seeds, None, &Failing, None).await.unwrap();
        assert_eq!(keywords, ["a", "b"]);
    }

    #[tokio::test]
    async fn empty_result_is_an_error() {
        let err = prepare_keywords(&[], None, &Failing, None).await.unwrap_err();
        assert!(matches!(err, ResearchError::Validation { .. }));

        let err = prepare_keywords(&[], Some("brief"), &Failing, None).await.unwrap_err();
        assert!(matches!(err, ResearchError::Service(_)));
    }
}
