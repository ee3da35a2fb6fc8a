//! Shared types, error model, and configuration for the research pipeline.
//!
//! This crate is the foundation depended on by all other workspace crates.
//! It provides:
//! - [`ResearchError`] — the unified error type
//! - Domain records ([`RawDocument`], [`NormalizedDocument`], [`Summary`], [`RunResult`])
//! - Configuration ([`AppConfig`], [`TaskConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_CONFIG_PATH, GeneratorConfig, RUN_LOG_FILE_NAME, TaskConfig, TaskEntry,
    load_config_from, load_env_file, resolve_api_key, resolve_env_value, validate_api_key,
};
pub use error::{ResearchError, Result};
pub use types::{
    DEFAULT_CHANNEL, Document, NORMALIZED_SOURCE, NormalizedDocument, RawDocument, RunResult,
    RunStatus, Summary,
};
