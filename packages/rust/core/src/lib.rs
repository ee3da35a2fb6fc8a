//! Core pipeline orchestration for product research.
//!
//! This crate ties together discovery, collection, normalization,
//! summarization, and reporting into end-to-end workflows, and runs them on
//! a schedule.

pub mod generator;
pub mod keywords;
pub mod monitor;
pub mod normalize;
pub mod pipeline;
pub mod scheduler;
pub mod summarize;

pub use generator::{GenerateOptions, OpenAiGenerator, TextGenerator};
pub use keywords::{generate_keywords_from_brief, prepare_keywords};
pub use monitor::RunMonitor;
pub use normalize::{detect_language, normalize_document, normalize_documents};
pub use pipeline::{
    Pipeline, PipelineOutcome, PipelineRequest, ProgressReporter, SilentProgress, SummarizeOptions,
};
pub use scheduler::{PipelineTaskExecutor, ScheduledRunner, TaskExecutor};
pub use summarize::{split_sentences, summarize_documents, summarize_documents_generated};
