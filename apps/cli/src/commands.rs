//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, info};

use researcher_collect::{CollectOptions, FetchStrategy, resolve_strategy};
use researcher_core::pipeline::{PipelineOutcome, PipelineRequest, ProgressReporter, SummarizeOptions};
use researcher_core::summarize::DEFAULT_MAX_POINTS;
use researcher_core::{
    OpenAiGenerator, Pipeline, PipelineTaskExecutor, RunMonitor, ScheduledRunner, TextGenerator,
    prepare_keywords,
};
use researcher_discovery::{
    DEFAULT_SEARCH_ENDPOINT, DiscoveryOptions, discovery_channels_for, list_channel_names,
    load_seed_list,
};
use researcher_report::{DEFAULT_REPORT_TITLE, ReportOptions};
use researcher_shared::{AppConfig, DEFAULT_CONFIG_PATH, load_config_from, validate_api_key};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Researcher: collect, summarize and report on product research sources.
#[derive(Parser)]
#[command(
    name = "researcher",
    version,
    about = "Discover, fetch, summarize and report on product research sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Schedule config file (JSON, or TOML when it ends in `.toml`).
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Find candidate source URLs for keywords through a search engine.
    Discover {
        #[command(flatten)]
        keywords: KeywordArgs,

        #[arg(long)]
        product_type: Option<String>,

        /// Restrict discovery to these channels (repeatable).
        #[arg(long = "channel")]
        channels: Vec<String>,

        #[arg(long, default_value_t = 5)]
        limit_per_keyword: usize,

        #[arg(long, default_value_t = 3)]
        limit_per_channel: usize,

        #[arg(long, default_value = DEFAULT_SEARCH_ENDPOINT)]
        search_endpoint: String,

        /// Also write the discovered URLs as a JSON array (usable as a seed list).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch URLs and append new raw documents to the store.
    Fetch {
        /// URLs to fetch.
        urls: Vec<String>,

        /// Seed list: a JSON array or one URL per line.
        #[arg(long)]
        url_file: Option<PathBuf>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        product_type: Option<String>,

        /// Concurrent fetch workers.
        #[arg(short, long)]
        concurrency: Option<usize>,

        #[command(flatten)]
        strategy: StrategyArgs,
    },

    /// Normalize stored raw documents.
    Normalize {
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Summarize the latest stored documents.
    Summarize {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[command(flatten)]
        summary: SummaryArgs,
    },

    /// Build a Markdown report from stored documents and summaries.
    Report {
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Report file to write.
        #[arg(short, long, default_value = "reports/report.md")]
        output: PathBuf,

        #[arg(long, default_value = DEFAULT_REPORT_TITLE)]
        title: String,
    },

    /// Run discover, fetch, normalize and summarize in one go.
    Pipeline {
        #[command(flatten)]
        keywords: KeywordArgs,

        /// Seed URLs fetched alongside discovered ones.
        #[arg(long = "url")]
        urls: Vec<String>,

        #[arg(long)]
        url_file: Option<PathBuf>,

        #[arg(long)]
        data_dir: Option<PathBuf>,

        #[arg(long)]
        product_type: Option<String>,

        #[arg(short, long)]
        concurrency: Option<usize>,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        summary: SummaryArgs,

        #[arg(long, default_value = DEFAULT_SEARCH_ENDPOINT)]
        search_endpoint: String,

        /// Also write a report to this file.
        #[arg(long)]
        report_output: Option<PathBuf>,

        #[arg(long)]
        report_title: Option<String>,
    },

    /// Run the configured tasks on their intervals.
    Schedule {
        /// Execute every task once and exit.
        #[arg(long)]
        run_once: bool,

        /// Stop after this many scheduler cycles.
        #[arg(long)]
        max_cycles: Option<u32>,

        /// Seconds to sleep between cycles.
        #[arg(long, default_value_t = 60)]
        sleep_seconds: u64,

        /// Run log file (defaults to `<log_dir>/pipeline.log`).
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show the loaded configuration and its resolved tasks.
    Show,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct KeywordArgs {
    /// Search keyword (repeatable).
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// Free-text product brief used to generate more keywords.
    #[arg(long)]
    brief: Option<String>,

    /// Model used for keyword generation.
    #[arg(long)]
    keyword_model: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub(crate) struct StrategyArgs {
    #[arg(long)]
    user_agent: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout: Option<f64>,

    #[arg(long)]
    max_retries: Option<u32>,

    /// Seconds between retries.
    #[arg(long)]
    retry_delay: Option<f64>,
}

impl StrategyArgs {
    /// The product-type strategy with these overrides, or `None` when no
    /// override was given.
    fn strategy(&self, product_type: Option<&str>) -> Option<FetchStrategy> {
        let overridden = self.user_agent.is_some()
            || self.timeout.is_some()
            || self.max_retries.is_some()
            || self.retry_delay.is_some();
        overridden.then(|| {
            resolve_strategy(product_type).with_overrides(
                self.user_agent.as_deref(),
                self.timeout,
                self.max_retries,
                self.retry_delay,
            )
        })
    }
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SummaryArgs {
    /// Summarize through the text-generation service.
    #[arg(long)]
    generated: bool,

    #[arg(long)]
    model: Option<String>,

    #[arg(long, default_value_t = DEFAULT_MAX_POINTS)]
    max_points: usize,
}

impl SummaryArgs {
    fn options(&self, config: &AppConfig) -> SummarizeOptions {
        SummarizeOptions {
            use_generated: self.generated || config.default_use_generated_summary,
            model: self.model.clone().or_else(|| config.default_model_name.clone()),
            max_points: self.max_points,
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "researcher=info",
        1 => "researcher=debug",
        _ => "researcher=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Discover {
            keywords,
            product_type,
            channels,
            limit_per_keyword,
            limit_per_channel,
            search_endpoint,
            output,
        } => {
            let config = load_config_or_default(&cli.config)?;
            let opts = DiscoveryOptions {
                endpoint: search_endpoint,
                limit_per_keyword,
                limit_per_channel,
                channels: select_channels(product_type.as_deref(), &channels)?,
                ..DiscoveryOptions::default()
            };
            cmd_discover(&config, &keywords, product_type.as_deref(), opts, output.as_deref()).await
        }
        Command::Fetch {
            urls,
            url_file,
            data_dir,
            product_type,
            concurrency,
            strategy,
        } => {
            let config = load_config_or_default(&cli.config)?;
            let urls = gather_urls(urls, url_file.as_deref())?;
            let product_type = product_type.or_else(|| config.default_product_type.clone());
            let opts = CollectOptions {
                base_strategy: strategy.strategy(product_type.as_deref()),
                ..CollectOptions::new(
                    product_type.as_deref(),
                    concurrency.unwrap_or(config.default_concurrency),
                )
            };
            cmd_fetch(&config, data_dir, &urls, &opts).await
        }
        Command::Normalize { data_dir } => {
            let config = load_config_or_default(&cli.config)?;
            let pipeline = open_pipeline(&config, data_dir)?;
            print_json(&pipeline.normalize().await?)
        }
        Command::Summarize { data_dir, summary } => {
            let config = load_config_or_default(&cli.config)?;
            let opts = summary.options(&config);
            if opts.use_generated {
                validate_api_key(&config)?;
            }
            let pipeline = open_pipeline(&config, data_dir)?;
            print_json(&pipeline.summarize(&opts).await?)
        }
        Command::Report {
            data_dir,
            output,
            title,
        } => {
            let config = load_config_or_default(&cli.config)?;
            cmd_report(&config, data_dir, &output, &title).await
        }
        Command::Pipeline {
            keywords,
            urls,
            url_file,
            data_dir,
            product_type,
            concurrency,
            strategy,
            summary,
            search_endpoint,
            report_output,
            report_title,
        } => {
            let config = load_config_or_default(&cli.config)?;
            let product_type = product_type.or_else(|| config.default_product_type.clone());
            let request = PipelineRequest {
                keywords: keywords.keywords,
                keyword_brief: keywords.brief,
                urls: gather_urls(urls, url_file.as_deref())?,
                strategy: strategy.strategy(product_type.as_deref()),
                product_type,
                concurrency: concurrency.unwrap_or(config.default_concurrency),
                summarize: summary.options(&config),
            };
            let discovery = DiscoveryOptions {
                endpoint: search_endpoint,
                ..DiscoveryOptions::default()
            };
            cmd_pipeline(&config, data_dir, request, discovery, report_output, report_title).await
        }
        Command::Schedule {
            run_once,
            max_cycles,
            sleep_seconds,
            log_file,
        } => {
            let config = load_config_from(&cli.config)?;
            cmd_schedule(&config, run_once, max_cycles, sleep_seconds, log_file).await
        }
        Command::Config { action } => match action {
            ConfigAction::Show => cmd_config_show(&cli.config),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The config at `path`, or defaults when the file does not exist.
fn load_config_or_default(path: &Path) -> Result<AppConfig> {
    if path.exists() {
        return Ok(load_config_from(path)?);
    }
    debug!(path = %path.display(), "no config file, using defaults");
    Ok(AppConfig::default())
}

fn build_generator(config: &AppConfig) -> Result<Arc<dyn TextGenerator>> {
    Ok(Arc::new(OpenAiGenerator::from_config(config)?))
}

fn open_pipeline(config: &AppConfig, data_dir: Option<PathBuf>) -> Result<Pipeline> {
    let data_dir = data_dir.unwrap_or_else(|| config.default_data_dir.clone());
    Ok(Pipeline::new(data_dir, build_generator(config)?)?)
}

/// Positional URLs followed by the seed list, if any.
fn gather_urls(mut urls: Vec<String>, url_file: Option<&Path>) -> Result<Vec<String>> {
    if let Some(path) = url_file {
        urls.extend(load_seed_list(path)?);
    }
    Ok(urls)
}

/// Discovery channels limited to `names`; `None` keeps the product-type set.
fn select_channels(
    product_type: Option<&str>,
    names: &[String],
) -> Result<Option<Vec<researcher_discovery::DiscoveryChannel>>> {
    if names.is_empty() {
        return Ok(None);
    }

    let available = list_channel_names(product_type);
    if let Some(unknown) = names.iter().find(|n| !available.contains(n)) {
        return Err(eyre!(
            "unknown discovery channel '{unknown}': expected one of {}",
            available.join(", ")
        ));
    }

    Ok(Some(
        discovery_channels_for(product_type)
            .into_iter()
            .filter(|c| names.contains(&c.name))
            .collect(),
    ))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_discover(
    config: &AppConfig,
    keywords: &KeywordArgs,
    product_type: Option<&str>,
    opts: DiscoveryOptions,
    output: Option<&Path>,
) -> Result<()> {
    let generator = build_generator(config)?;
    let prepared = prepare_keywords(
        &keywords.keywords,
        keywords.brief.as_deref(),
        generator.as_ref(),
        keywords.keyword_model.as_deref(),
    )
    .await?;

    info!(keywords = prepared.len(), "discovering sources");
    let pipeline = open_pipeline(config, None)?.with_discovery(opts);
    let outcome = pipeline.discover(&prepared, product_type).await?;

    if let Some(path) = output {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&outcome.sources)?)?;
        info!(path = %path.display(), "seed list written");
    }

    print_json(&outcome)
}

async fn cmd_fetch(
    config: &AppConfig,
    data_dir: Option<PathBuf>,
    urls: &[String],
    opts: &CollectOptions,
) -> Result<()> {
    if urls.is_empty() {
        return Err(eyre!("no URLs given: pass URLs or --url-file"));
    }

    let pipeline = open_pipeline(config, data_dir)?;
    let spinner = CliProgress::new();
    spinner.phase(&format!("Fetching {} URLs", urls.len()));
    let outcome = pipeline.fetch(urls, opts).await;
    spinner.finish();

    print_json(&outcome?)
}

async fn cmd_report(config: &AppConfig, data_dir: Option<PathBuf>, output: &Path, title: &str) -> Result<()> {
    let pipeline = open_pipeline(config, data_dir)?;
    let opts = ReportOptions::titled(Some(title));

    match pipeline.report(&opts, output).await? {
        Some(outcome) => print_json(&outcome),
        None => Err(eyre!(
            "no documents in {}; run fetch first",
            pipeline.store().data_dir().display()
        )),
    }
}

async fn cmd_pipeline(
    config: &AppConfig,
    data_dir: Option<PathBuf>,
    request: PipelineRequest,
    discovery: DiscoveryOptions,
    report_output: Option<PathBuf>,
    report_title: Option<String>,
) -> Result<()> {
    if request.summarize.use_generated {
        validate_api_key(config)?;
    }

    let pipeline = open_pipeline(config, data_dir)?.with_discovery(discovery);
    let reporter = CliProgress::new();
    let outcome = pipeline.run(&request, &reporter).await;
    reporter.finish();
    let outcome = outcome?;

    let report = match report_output {
        Some(path) => {
            let opts = ReportOptions::titled(report_title.as_deref());
            pipeline.report(&opts, &path).await?
        }
        None => None,
    };

    let mut value = serde_json::to_value(&outcome)?;
    if let (Some(report), Some(map)) = (report, value.as_object_mut()) {
        map.insert("report".into(), serde_json::to_value(report)?);
    }
    print_json(&value)
}

async fn cmd_schedule(
    config: &AppConfig,
    run_once: bool,
    max_cycles: Option<u32>,
    sleep_seconds: u64,
    log_file: Option<PathBuf>,
) -> Result<()> {
    let monitor = RunMonitor::new(log_file.unwrap_or_else(|| config.run_log_path()));
    let executor = Arc::new(PipelineTaskExecutor::from_config(config)?);
    let runner = ScheduledRunner::new(config, monitor.clone(), executor)?;

    if runner.tasks().is_empty() {
        return Err(eyre!("no tasks configured"));
    }

    info!(
        tasks = runner.tasks().len(),
        log = %monitor.log_path().display(),
        "starting scheduler"
    );

    if run_once {
        let results = runner.run_once().await;
        return print_json(&results);
    }

    tokio::select! {
        executions = runner.run(max_cycles, Duration::from_secs(sleep_seconds)) => {
            print_json(&serde_json::json!({ "executions": executions }))
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, scheduler stopped");
            Ok(())
        }
    }
}

fn cmd_config_show(path: &Path) -> Result<()> {
    let config = load_config_from(path)?;
    println!("{}", toml::to_string_pretty(&config)?);

    #[derive(Serialize)]
    struct Resolved<'a> {
        tasks: &'a [researcher_shared::TaskConfig],
    }
    let tasks = config.resolved_tasks()?;
    println!("# resolved");
    println!("{}", toml::to_string_pretty(&Resolved { tasks: &tasks })?);
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, outcome: &PipelineOutcome) {
        self.spinner.finish_and_clear();
        info!(
            fetched = outcome.fetch.fetched,
            normalized = outcome.normalize.normalized,
            summarized = outcome.summarize.summarized,
            "pipeline complete"
        );
    }
}
