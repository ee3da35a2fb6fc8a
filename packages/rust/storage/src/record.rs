//! Record kinds persisted by the store.

use serde::Serialize;
use serde::de::DeserializeOwned;

use researcher_shared::{NormalizedDocument, RawDocument, Summary};

/// One append-only log per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    Raw,
    Normalized,
    Summary,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [Self::Raw, Self::Normalized, Self::Summary];

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Raw => "raw.jsonl",
            Self::Normalized => "normalized.jsonl",
            Self::Summary => "summary.jsonl",
        }
    }
}

/// A record that can live in the store, keyed by URL.
pub trait StoreRecord: Serialize + DeserializeOwned + Send + Sync {
    const KIND: StoreKind;

    fn url(&self) -> &str;
}

impl StoreRecord for RawDocument {
    const KIND: StoreKind = StoreKind::Raw;

    fn url(&self) -> &str {
        &self.url
    }
}

impl StoreRecord for NormalizedDocument {
    const KIND: StoreKind = StoreKind::Normalized;

    fn url(&self) -> &str {
        &self.base.url
    }
}

impl StoreRecord for Summary {
    const KIND: StoreKind = StoreKind::Summary;

    fn url(&self) -> &str {
        &self.url
    }
}
