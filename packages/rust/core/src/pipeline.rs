//! Staged pipeline: discover → fetch → normalize → summarize, plus report.
//!
//! Each stage reads from and writes to one data directory's
//! [`DocumentStore`], so stages can also be run one at a time.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use researcher_collect::{CollectOptions, Collector, FetchStrategy};
use researcher_discovery::{DiscoveryOptions, discover_sources};
use researcher_report::{ReportOptions, build_report, write_report};
use researcher_shared::{
    DEFAULT_CHANNEL, Document, ResearchError, Result, TaskConfig,
};
use researcher_storage::{DocumentStore, StoreKind};

use crate::generator::TextGenerator;
use crate::keywords::prepare_keywords;
use crate::normalize::normalize_documents;
use crate::summarize::{
    DEFAULT_MAX_POINTS, GeneratedSummaryOptions, summarize_documents, summarize_documents_generated,
};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage.
    fn phase(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, outcome: &PipelineOutcome);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _outcome: &PipelineOutcome) {}
}

// ---------------------------------------------------------------------------
// Stage outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DiscoverOutcome {
    pub keywords: Vec<String>,
    pub product_type: Option<String>,
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchOutcome {
    pub fetched: usize,
    pub added: usize,
    pub file: PathBuf,
    /// Channels that produced at least one document, sorted.
    pub channels: Vec<String>,
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeOutcome {
    pub normalized: usize,
    pub added: usize,
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeOutcome {
    pub summarized: usize,
    pub added: usize,
    /// `normalized` or `raw`: which stage the summaries were built from.
    pub source: String,
    pub file: PathBuf,
    /// `generated` or `basic`.
    pub summarizer: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub report_file: PathBuf,
    pub documents: usize,
    pub summaries: usize,
    pub title: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discover: Option<DiscoverOutcome>,
    pub fetch: FetchOutcome,
    pub normalize: NormalizeOutcome,
    pub summarize: SummarizeOutcome,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub use_generated: bool,
    pub model: Option<String>,
    pub max_points: usize,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            use_generated: false,
            model: None,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

/// Inputs for a full [`Pipeline::run`].
#[derive(Debug, Clone, Default)]
pub struct PipelineRequest {
    pub keywords: Vec<String>,
    pub keyword_brief: Option<String>,
    pub urls: Vec<String>,
    pub product_type: Option<String>,
    pub concurrency: usize,
    /// Replaces the product-type default strategy.
    pub strategy: Option<FetchStrategy>,
    pub summarize: SummarizeOptions,
}

impl PipelineRequest {
    pub fn from_task(task: &TaskConfig) -> Self {
        Self {
            keywords: task.keywords.clone(),
            keyword_brief: task.keyword_brief.clone(),
            urls: task.urls.clone(),
            product_type: task.product_type.clone(),
            concurrency: task.concurrency,
            strategy: None,
            summarize: SummarizeOptions {
                use_generated: task.use_generated_summary,
                model: task.model_name.clone(),
                max_points: DEFAULT_MAX_POINTS,
            },
        }
    }

    fn has_brief(&self) -> bool {
        self.keyword_brief.as_deref().is_some_and(|b| !b.trim().is_empty())
    }

    fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            base_strategy: self.strategy.clone(),
            ..CollectOptions::new(self.product_type.as_deref(), self.concurrency)
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Pipeline bound to one data directory.
pub struct Pipeline {
    store: DocumentStore,
    collector: Collector,
    generator: Arc<dyn TextGenerator>,
    discovery: DiscoveryOptions,
}

impl Pipeline {
    pub fn new(data_dir: impl Into<PathBuf>, generator: Arc<dyn TextGenerator>) -> Result<Self> {
        Ok(Self {
            store: DocumentStore::new(data_dir),
            collector: Collector::new()?,
            generator,
            discovery: DiscoveryOptions::default(),
        })
    }

    pub fn with_discovery(mut self, discovery: DiscoveryOptions) -> Self {
        self.discovery = discovery;
        self
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Find candidate URLs for `keywords`.
    pub async fn discover(&self, keywords: &[String], product_type: Option<&str>) -> Result<DiscoverOutcome> {
        let sources = discover_sources(keywords, product_type, &self.discovery).await?;
        Ok(DiscoverOutcome {
            keywords: keywords.to_vec(),
            product_type: product_type.map(str::to_string),
            sources,
        })
    }

    /// Fetch `urls` through the channel router and append new raw documents.
    #[instrument(skip_all, fields(urls = urls.len()))]
    pub async fn fetch(&self, urls: &[String], opts: &CollectOptions) -> Result<FetchOutcome> {
        let documents = self.collector.collect(urls, opts).await;
        let added = self.store.add_raw(&documents).await?;

        let mut channels: Vec<String> = documents
            .iter()
            .map(|d| d.channel.clone().unwrap_or_else(|| DEFAULT_CHANNEL.to_string()))
            .collect();
        channels.sort();
        channels.dedup();

        info!(fetched = documents.len(), added, "fetch stage complete");
        Ok(FetchOutcome {
            fetched: documents.len(),
            added,
            file: self.store.path_for(StoreKind::Raw),
            channels,
            concurrency: opts.concurrency,
        })
    }

    /// Normalize every stored raw document and append the new ones.
    #[instrument(skip_all)]
    pub async fn normalize(&self) -> Result<NormalizeOutcome> {
        let raw = self.store.load_raw().await?;
        let normalized = normalize_documents(&raw);
        let added = self.store.add_normalized(&normalized).await?;

        info!(normalized = normalized.len(), added, "normalize stage complete");
        Ok(NormalizeOutcome {
            normalized: normalized.len(),
            added,
            file: self.store.path_for(StoreKind::Normalized),
        })
    }

    /// Normalized documents when any exist, raw documents otherwise.
    async fn latest_documents(&self) -> Result<(Vec<Document>, &'static str)> {
        let normalized = self.store.load_normalized().await?;
        if !normalized.is_empty() {
            return Ok((Document::from_normalized(normalized), "normalized"));
        }
        Ok((Document::from_raw(self.store.load_raw().await?), "raw"))
    }

    /// Summarize the latest documents and append the new summaries.
    #[instrument(skip_all, fields(generated = opts.use_generated))]
    pub async fn summarize(&self, opts: &SummarizeOptions) -> Result<SummarizeOutcome> {
        let (documents, source) = self.latest_documents().await?;

        let summaries = if opts.use_generated {
            let gen_opts = GeneratedSummaryOptions {
                model: opts.model.clone(),
                max_points: opts.max_points,
                fallback_to_basic: true,
            };
            summarize_documents_generated(&documents, self.generator.as_ref(), &gen_opts).await
        } else {
            summarize_documents(&documents, opts.max_points)
        };
        let added = self.store.add_summaries(&summaries).await?;

        info!(summarized = summaries.len(), added, source, "summarize stage complete");
        Ok(SummarizeOutcome {
            summarized: summaries.len(),
            added,
            source: source.to_string(),
            file: self.store.path_for(StoreKind::Summary),
            summarizer: if opts.use_generated { "generated" } else { "basic" }.to_string(),
        })
    }

    /// Write a Markdown report to `output`. Returns `None` when the store
    /// holds no documents.
    #[instrument(skip_all, fields(output = %output.display()))]
    pub async fn report(&self, opts: &ReportOptions, output: &Path) -> Result<Option<ReportOutcome>> {
        let (documents, _) = self.latest_documents().await?;
        if documents.is_empty() {
            warn!("no documents available to build a report");
            return Ok(None);
        }

        let summaries = self.store.load_summaries().await?;
        let report = build_report(&documents, &summaries, opts);
        write_report(output, &report)?;

        Ok(Some(ReportOutcome {
            report_file: output.to_path_buf(),
            documents: documents.len(),
            summaries: summaries.len(),
            title: report.title,
        }))
    }

    /// Run discover (when keywords or a brief are given), fetch, normalize
    /// and summarize.
    ///
    /// Fails before any network or store I/O when the request has neither
    /// keywords, a brief, nor URLs; fails after discovery when no URL is left.
    #[instrument(skip_all, fields(data_dir = %self.store.data_dir().display()))]
    pub async fn run(&self, request: &PipelineRequest, progress: &dyn ProgressReporter) -> Result<PipelineOutcome> {
        let wants_discovery = !request.keywords.is_empty() || request.has_brief();
        if !wants_discovery && request.urls.is_empty() {
            return Err(ResearchError::config("no keywords, keyword brief or URLs provided"));
        }

        let discover = if wants_discovery {
            progress.phase("Discovering sources");
            let keywords = prepare_keywords(
                &request.keywords,
                request.keyword_brief.as_deref(),
                self.generator.as_ref(),
                request.summarize.model.as_deref(),
            )
            .await?;
            Some(self.discover(&keywords, request.product_type.as_deref()).await?)
        } else {
            None
        };

        let mut urls: Vec<String> = Vec::new();
        let discovered = discover.iter().flat_map(|d| d.sources.iter());
        for url in request.urls.iter().chain(discovered) {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
        if urls.is_empty() {
            return Err(ResearchError::validation("no URLs provided or discovered"));
        }

        progress.phase("Fetching documents");
        let fetch = self.fetch(&urls, &request.collect_options()).await?;

        progress.phase("Normalizing");
        let normalize = self.normalize().await?;

        progress.phase("Summarizing");
        let summarize = self.summarize(&request.summarize).await?;

        let outcome = PipelineOutcome {
            discover,
            fetch,
            normalize,
            summarize,
        };
        progress.done(&outcome);
        Ok(outcome)
    }
}
