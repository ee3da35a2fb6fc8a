//! Core domain records for the research pipeline.
//!
//! Every record kind is keyed by `url`. Records are immutable once created;
//! the pipeline only ever derives new records from old ones
//! (raw → normalized → summary).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Channel name used when a document was not routed to a specific channel.
pub const DEFAULT_CHANNEL: &str = "general";

/// Provenance tag written on every normalized document.
pub const NORMALIZED_SOURCE: &str = "normalized";

// ---------------------------------------------------------------------------
// RawDocument
// ---------------------------------------------------------------------------

/// A fetched page with markup stripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    /// Source URL; the natural key.
    pub url: String,
    /// `<title>` text, or the URL when the page has none.
    pub title: String,
    /// Plain-text content.
    pub content: String,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
    /// Channel the URL was routed through.
    #[serde(default)]
    pub channel: Option<String>,
}

impl RawDocument {
    /// Build a document fetched now, without a channel tag.
    pub fn new(url: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            fetched_at: Utc::now(),
            channel: None,
        }
    }

    /// Return the same document tagged with `channel`.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }
}

// ---------------------------------------------------------------------------
// NormalizedDocument
// ---------------------------------------------------------------------------

/// A raw document after whitespace compaction and line de-duplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDocument {
    /// The cleaned raw fields (stored flat alongside the extension fields).
    #[serde(flatten)]
    pub base: RawDocument,
    /// Detected language tag (`zh` / `en`).
    #[serde(default)]
    pub language: Option<String>,
    /// Provenance tag.
    #[serde(default)]
    pub source: Option<String>,
    /// When normalization happened.
    pub normalized_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Bullet-point summary of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub url: String,
    pub bullet_points: Vec<String>,
    pub summarized_at: DateTime<Utc>,
}

impl Summary {
    pub fn new(url: impl Into<String>, bullet_points: Vec<String>) -> Self {
        Self {
            url: url.into(),
            bullet_points,
            summarized_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Either stage of a document, with uniform access to the shared fields.
///
/// Consumers that need normalized-only fields match on the variant (or call
/// [`Document::normalized`]) instead of probing for optional data.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Raw(RawDocument),
    Normalized(NormalizedDocument),
}

impl Document {
    fn base(&self) -> &RawDocument {
        match self {
            Self::Raw(doc) => doc,
            Self::Normalized(doc) => &doc.base,
        }
    }

    pub fn url(&self) -> &str {
        &self.base().url
    }

    pub fn title(&self) -> &str {
        &self.base().title
    }

    pub fn content(&self) -> &str {
        &self.base().content
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.base().fetched_at
    }

    pub fn channel(&self) -> Option<&str> {
        self.base().channel.as_deref()
    }

    /// Language tag; always `None` for raw documents.
    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Raw(_) => None,
            Self::Normalized(doc) => doc.language.as_deref(),
        }
    }

    /// The normalized record, if this document has been normalized.
    pub fn normalized(&self) -> Option<&NormalizedDocument> {
        match self {
            Self::Raw(_) => None,
            Self::Normalized(doc) => Some(doc),
        }
    }

    /// Wrap a batch of raw documents.
    pub fn from_raw(docs: Vec<RawDocument>) -> Vec<Self> {
        docs.into_iter().map(Self::Raw).collect()
    }

    /// Wrap a batch of normalized documents.
    pub fn from_normalized(docs: Vec<NormalizedDocument>) -> Vec<Self> {
        docs.into_iter().map(Self::Normalized).collect()
    }
}

impl From<RawDocument> for Document {
    fn from(doc: RawDocument) -> Self {
        Self::Raw(doc)
    }
}

impl From<NormalizedDocument> for Document {
    fn from(doc: NormalizedDocument) -> Self {
        Self::Normalized(doc)
    }
}

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

/// Outcome of one scheduled task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit record of one task execution, written once to the run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Time-sortable identifier for correlating with tracing output.
    pub run_id: Uuid,
    pub task: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// `finished_at - started_at` in seconds; never negative.
    pub duration_seconds: f64,
    #[serde(default)]
    pub detail: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
