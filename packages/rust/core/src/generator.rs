//! Text-generation collaborator used for keyword expansion and generated
//! summaries.
//!
//! [`TextGenerator`] is the seam; [`OpenAiGenerator`] talks to any
//! OpenAI-compatible `/chat/completions` endpoint. Callers receive the
//! generator explicitly, there is no process-wide default instance.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use researcher_shared::{AppConfig, ResearchError, Result, resolve_api_key, resolve_env_value};

/// Base URL used when the configured env var is unset.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const TEMPERATURE: f32 = 0.2;

/// Per-call generation options.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub system_prompt: Option<String>,
    /// Overrides the generator's default model.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
}

/// Produces text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion. Fails with [`ResearchError::Service`].
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// OpenAI-compatible client
// ---------------------------------------------------------------------------

/// Chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    /// Env var the key was expected in; used in error messages.
    api_key_env: String,
    default_model: String,
}

impl OpenAiGenerator {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        default_model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResearchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            api_key_env: "OPENAI_API_KEY".to_string(),
            default_model: default_model.to_string(),
        })
    }

    /// Build from the `generator` config section. A missing key is not an
    /// error here; it surfaces on the first [`TextGenerator::generate`] call.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let generator = &config.generator;
        let base_url = resolve_env_value(config, &generator.base_url_env)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut client = Self::new(
            &base_url,
            resolve_api_key(config),
            &generator.default_model,
            Duration::from_secs(generator.timeout_secs),
        )?;
        client.api_key_env = generator.api_key_env.clone();
        Ok(client)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model))]
    async fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            ResearchError::Service(format!("{} is required for text generation", self.api_key_env))
        })?;

        let model = opts.model.as_deref().unwrap_or(&self.default_model);
        tracing::Span::current().record("model", model);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = opts.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });

        let request = ChatRequest {
            model,
            messages,
            temperature: TEMPERATURE,
            max_tokens: opts.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ResearchError::Service(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Service(format!("{url}: HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ResearchError::Service(format!("malformed completion response: {e}")))?;

        let content = extract_content(parsed)?;
        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

fn extract_content(response: ChatResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ResearchError::Service("completion response missing choices".into()))?;

    let message = choice
        .message
        .ok_or_else(|| ResearchError::Service("completion response missing message".into()))?;

    match message.content {
        Some(serde_json::Value::String(text)) => Ok(text.trim().to_string()),
        _ => Err(ResearchError::Service("completion content is not a string".into())),
    }
}
