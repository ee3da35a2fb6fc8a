//! Schedule and pipeline configuration.
//!
//! A schedule file lists named tasks plus workspace-wide defaults. Per-task
//! fields fall back to the matching `default_*` value when absent. Files
//! ending in `.toml` are parsed as TOML; anything else as JSON.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ResearchError, Result};

/// Default schedule file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/schedule.json";

/// File name of the run log inside `log_dir`.
pub const RUN_LOG_FILE_NAME: &str = "pipeline.log";

// ---------------------------------------------------------------------------
// Config structs (matching the schedule file schema)
// ---------------------------------------------------------------------------

/// Top-level schedule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Data directory for tasks without their own `data_dir`.
    #[serde(default = "default_data_dir")]
    pub default_data_dir: PathBuf,

    /// Product type used for strategy/channel selection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_product_type: Option<String>,

    /// Fetch worker count.
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,

    /// Whether summaries go through the text-generation service.
    #[serde(default, alias = "default_use_llm")]
    pub default_use_generated_summary: bool,

    /// Model passed to the text-generation service.
    #[serde(
        default,
        alias = "default_llm_model",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_model_name: Option<String>,

    /// Minutes between runs of the same task.
    #[serde(default = "default_interval_minutes")]
    pub default_interval_minutes: u64,

    /// Directory holding the run log.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Optional `KEY=VALUE` file consulted for credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_file: Option<PathBuf>,

    /// Text-generation service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Task entries as written in the file.
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_data_dir: default_data_dir(),
            default_product_type: None,
            default_concurrency: default_concurrency(),
            default_use_generated_summary: false,
            default_model_name: None,
            default_interval_minutes: default_interval_minutes(),
            log_dir: default_log_dir(),
            env_file: None,
            generator: GeneratorConfig::default(),
            tasks: Vec::new(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_concurrency() -> usize {
    1
}
fn default_interval_minutes() -> u64 {
    60
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

/// `generator` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Name of the env var that may override the API base URL.
    #[serde(default = "default_base_url_env")]
    pub base_url_env: String,

    /// Model used when neither the task nor the defaults name one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url_env: default_base_url_env(),
            default_model: default_model(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_base_url_env() -> String {
    "OPENAI_BASE_URL".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_generator_timeout() -> u64 {
    20
}

/// One `tasks[]` entry; every field except the lists is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_brief: Option<String>,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(default, alias = "use_llm", skip_serializing_if = "Option::is_none")]
    pub use_generated_summary: Option<bool>,
    #[serde(default, alias = "llm_model", skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_output: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u64>,
}

// ---------------------------------------------------------------------------
// Task config (runtime, merged from entry + defaults)
// ---------------------------------------------------------------------------

/// A task with every default applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskConfig {
    pub name: String,
    pub keywords: Vec<String>,
    pub keyword_brief: Option<String>,
    /// Seed URLs fetched in addition to discovered ones.
    pub urls: Vec<String>,
    pub product_type: Option<String>,
    pub concurrency: usize,
    pub use_generated_summary: bool,
    pub model_name: Option<String>,
    pub data_dir: PathBuf,
    pub report_output: Option<PathBuf>,
    pub report_title: Option<String>,
    pub interval_minutes: u64,
}

impl TaskConfig {
    /// Build a task named `name` with every other field taken from `config`.
    pub fn new(name: impl Into<String>, config: &AppConfig) -> Self {
        TaskEntry {
            name: Some(name.into()),
            ..TaskEntry::default()
        }
        .resolve(0, config)
    }
}

impl TaskEntry {
    /// Apply `config` defaults. `index` names unnamed tasks (`task_<index+1>`).
    pub fn resolve(&self, index: usize, config: &AppConfig) -> TaskConfig {
        let name = self
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("task_{}", index + 1));

        TaskConfig {
            name,
            keywords: self.keywords.clone(),
            keyword_brief: self.keyword_brief.clone(),
            urls: self.urls.clone(),
            product_type: self
                .product_type
                .clone()
                .or_else(|| config.default_product_type.clone()),
            concurrency: self.concurrency.unwrap_or(config.default_concurrency),
            use_generated_summary: self
                .use_generated_summary
                .unwrap_or(config.default_use_generated_summary),
            model_name: self
                .model_name
                .clone()
                .or_else(|| config.default_model_name.clone()),
            data_dir: self
                .data_dir
                .clone()
                .unwrap_or_else(|| config.default_data_dir.clone()),
            report_output: self.report_output.clone(),
            report_title: self.report_title.clone(),
            interval_minutes: self
                .interval_minutes
                .unwrap_or(config.default_interval_minutes),
        }
    }
}

impl AppConfig {
    /// Resolve every task entry, rejecting duplicate task names.
    pub fn resolved_tasks(&self) -> Result<Vec<TaskConfig>> {
        let mut seen = HashSet::new();
        let mut tasks = Vec::with_capacity(self.tasks.len());

        for (idx, entry) in self.tasks.iter().enumerate() {
            let task = entry.resolve(idx, self);
            if !seen.insert(task.name.clone()) {
                return Err(ResearchError::config(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
            tasks.push(task);
        }

        Ok(tasks)
    }

    /// Path of the run log inside `log_dir`.
    pub fn run_log_path(&self) -> PathBuf {
        self.log_dir.join(RUN_LOG_FILE_NAME)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the schedule config from `path` and validate its task list.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Err(ResearchError::config(format!(
            "config file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ResearchError::io(path, e))?;
    let is_toml = path.extension().is_some_and(|ext| ext == "toml");

    let config: AppConfig = if is_toml {
        toml::from_str(&content).map_err(|e| {
            ResearchError::config(format!("failed to parse {}: {e}", path.display()))
        })?
    } else {
        serde_json::from_str(&content).map_err(|e| {
            ResearchError::config(format!("failed to parse {}: {e}", path.display()))
        })?
    };

    config.resolved_tasks()?;
    tracing::debug!(?path, tasks = config.tasks.len(), "loaded schedule config");

    Ok(config)
}

/// Parse a `KEY=VALUE` env file. A missing file yields an empty map;
/// blank lines, `#` comments and lines without `=` are ignored.
pub fn load_env_file(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let content = std::fs::read_to_string(path).map_err(|e| ResearchError::io(path, e))?;
    let mut values = HashMap::new();

    for line in content.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }
        let Some((key, value)) = stripped.split_once('=') else {
            continue;
        };
        values
            .entry(key.trim().to_string())
            .or_insert_with(|| value.trim().to_string());
    }

    Ok(values)
}

/// Look up an env var, consulting the configured env file when the process
/// environment does not define it.
pub fn resolve_env_value(config: &AppConfig, name: &str) -> Option<String> {
    if let Ok(value) = std::env::var(name) {
        return Some(value);
    }

    let path = config.env_file.as_deref()?;
    match load_env_file(path) {
        Ok(values) => values.get(name).cloned(),
        Err(e) => {
            tracing::warn!(?path, error = %e, "failed to read env file");
            None
        }
    }
}

/// Resolve the text-generation API key (empty values count as missing).
pub fn resolve_api_key(config: &AppConfig) -> Option<String> {
    resolve_env_value(config, &config.generator.api_key_env).filter(|v| !v.is_empty())
}

/// Check that the text-generation API key is available.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    match resolve_api_key(config) {
        Some(_) => Ok(()),
        None => Err(ResearchError::config(format!(
            "text-generation API key not found. Set the {} environment variable \
             or add it to the configured env_file.",
            config.generator.api_key_env
        ))),
    }
}
