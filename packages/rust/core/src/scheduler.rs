//! Interval scheduler for configured pipeline tasks.
//!
//! Tasks run sequentially in config order. A failing task is recorded as
//! `failed` and never stops the cycle; every execution produces exactly one
//! run-log line.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};
use uuid::Uuid;

use researcher_report::ReportOptions;
use researcher_shared::{AppConfig, Result, RunResult, RunStatus, TaskConfig};

use crate::generator::{OpenAiGenerator, TextGenerator};
use crate::monitor::RunMonitor;
use crate::pipeline::{Pipeline, PipelineRequest, SilentProgress};

// ---------------------------------------------------------------------------
// Executor seam
// ---------------------------------------------------------------------------

/// Runs the work behind one task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the pipeline for `task`; the returned map becomes the run detail.
    async fn run_pipeline(&self, task: &TaskConfig) -> Result<Map<String, Value>>;

    /// Write the task's report, returning its path (`None` if nothing was written).
    async fn run_report(&self, task: &TaskConfig) -> Result<Option<PathBuf>>;
}

/// Production executor backed by [`Pipeline`].
pub struct PipelineTaskExecutor {
    generator: Arc<dyn TextGenerator>,
}

impl PipelineTaskExecutor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Executor whose generator is built from the config's `generator` section.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(OpenAiGenerator::from_config(config)?)))
    }
}

#[async_trait]
impl TaskExecutor for PipelineTaskExecutor {
    async fn run_pipeline(&self, task: &TaskConfig) -> Result<Map<String, Value>> {
        let pipeline = Pipeline::new(&task.data_dir, self.generator.clone())?;
        let outcome = pipeline
            .run(&PipelineRequest::from_task(task), &SilentProgress)
            .await?;

        let mut detail = Map::new();
        detail.insert("data_dir".into(), Value::from(task.data_dir.display().to_string()));
        detail.insert("keywords".into(), Value::from(task.keywords.clone()));
        detail.insert("urls".into(), Value::from(task.urls.clone()));
        detail.insert("product_type".into(), Value::from(task.product_type.clone()));
        detail.insert("fetched".into(), Value::from(outcome.fetch.fetched));
        detail.insert("added".into(), Value::from(outcome.fetch.added));
        detail.insert("summarized".into(), Value::from(outcome.summarize.summarized));
        Ok(detail)
    }

    async fn run_report(&self, task: &TaskConfig) -> Result<Option<PathBuf>> {
        let Some(output) = task.report_output.as_deref() else {
            return Ok(None);
        };

        let pipeline = Pipeline::new(&task.data_dir, self.generator.clone())?;
        let opts = ReportOptions::titled(task.report_title.as_deref());
        let outcome = pipeline.report(&opts, output).await?;
        Ok(outcome.map(|o| o.report_file))
    }
}

// ---------------------------------------------------------------------------
// ScheduledRunner
// ---------------------------------------------------------------------------

/// Executes configured tasks once or on their intervals.
pub struct ScheduledRunner {
    tasks: Vec<TaskConfig>,
    monitor: RunMonitor,
    executor: Arc<dyn TaskExecutor>,
}

impl ScheduledRunner {
    /// Fails when two tasks resolve to the same name.
    pub fn new(config: &AppConfig, monitor: RunMonitor, executor: Arc<dyn TaskExecutor>) -> Result<Self> {
        Ok(Self {
            tasks: config.resolved_tasks()?,
            monitor,
            executor,
        })
    }

    pub fn tasks(&self) -> &[TaskConfig] {
        &self.tasks
    }

    /// Execute every task once, in config order.
    #[instrument(skip_all, fields(tasks = self.tasks.len()))]
    pub async fn run_once(&self) -> Vec<RunResult> {
        let mut results = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            results.push(self.execute(task).await);
        }
        results
    }

    /// Run cycles until `max_cycles` is reached (forever when `None`).
    ///
    /// Each cycle executes every task whose next run time has arrived, then
    /// moves that time to the cycle's start plus the task interval. Sleeps
    /// `sleep` between cycles but not after the last. Returns the number of
    /// task executions.
    #[instrument(skip_all, fields(tasks = self.tasks.len(), max_cycles = ?max_cycles))]
    pub async fn run(&self, max_cycles: Option<u32>, sleep: Duration) -> u64 {
        let start = Utc::now();
        let mut next_run: HashMap<&str, DateTime<Utc>> =
            self.tasks.iter().map(|t| (t.name.as_str(), start)).collect();

        let mut cycles: u32 = 0;
        let mut executions: u64 = 0;
        loop {
            let now = Utc::now();
            for task in &self.tasks {
                let due = next_run.get(task.name.as_str()).is_none_or(|at| now >= *at);
                if !due {
                    continue;
                }
                self.execute(task).await;
                executions += 1;
                next_run.insert(task.name.as_str(), advance(now, task.interval_minutes));
            }

            cycles = cycles.saturating_add(1);
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
            if !sleep.is_zero() {
                tokio::time::sleep(sleep).await;
            }
        }

        info!(cycles, executions, "scheduler stopped");
        executions
    }

    /// Run one task and record its result.
    #[instrument(skip_all, fields(task = %task.name))]
    async fn execute(&self, task: &TaskConfig) -> RunResult {
        let started_at = self.monitor.start();
        let outcome = self.run_task(task).await;
        let (finished_at, duration_seconds) = self.monitor.finish(started_at);

        let (status, detail, error) = match outcome {
            Ok(detail) => (RunStatus::Success, detail, None),
            Err(e) => {
                error!(error = %e, "task failed");
                (RunStatus::Failed, Map::new(), Some(e.to_string()))
            }
        };

        let result = RunResult {
            run_id: Uuid::now_v7(),
            task: task.name.clone(),
            status,
            started_at,
            finished_at,
            duration_seconds,
            detail,
            error,
        };

        if let Err(e) = self.monitor.record(&result).await {
            error!(error = %e, "failed to record run result");
        }
        info!(status = %result.status, duration_seconds, "task finished");
        result
    }

    async fn run_task(&self, task: &TaskConfig) -> Result<Map<String, Value>> {
        let mut detail = self.executor.run_pipeline(task).await?;
        if task.report_output.is_some() {
            if let Some(path) = self.executor.run_report(task).await? {
                detail.insert("report_file".into(), Value::from(path.display().to_string()));
            }
        }
        Ok(detail)
    }
}

/// `now + minutes`, saturating at the latest representable time.
fn advance(now: DateTime<Utc>, minutes: u64) -> DateTime<Utc> {
    i64::try_from(minutes)
        .ok()
        .and_then(TimeDelta::try_minutes)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use researcher_shared::{ResearchError, TaskEntry};

    /// Fails the tasks named in `failing`; records every call.
    #[derive(Default)]
    struct FakeExecutor {
        failing: Vec<&'static str>,
        fail_report: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TaskExecutor for FakeExecutor {
        async fn run_pipeline(&self, task: &TaskConfig) -> Result<Map<String, Value>> {
            self.calls.lock().unwrap().push(task.name.clone());
            if self.failing.contains(&task.name.as_str()) {
                return Err(ResearchError::validation(format!("{} exploded", task.name)));
            }
            let mut detail = Map::new();
            detail.insert("fetched".into(), Value::from(1));
            Ok(detail)
        }

        async fn run_report(&self, task: &TaskConfig) -> Result<Option<PathBuf>> {
            if self.fail_report {
                return Err(ResearchError::Storage("disk full".into()));
            }
            Ok(task.report_output.clone())
        }
    }

    fn log_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("researcher_sched_{}", Uuid::now_v7()))
            .join("pipeline.log")
    }

    fn config(tasks: &[(&str, u64)]) -> AppConfig {
        AppConfig {
            tasks: tasks
                .iter()
                .map(|(name, interval)| TaskEntry {
                    name: Some(name.to_string()),
                    urls: vec!["https://example.com".into()],
                    interval_minutes: Some(*interval),
                    ..TaskEntry::default()
                })
                .collect(),
            ..AppConfig::default()
        }
    }

    fn log_lines(path: &PathBuf) -> Vec<RunResult> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn failing_task_does_not_stop_others() {
        let path = log_path();
        let executor = Arc::new(FakeExecutor {
            failing: vec!["bad"],
            ..FakeExecutor::default()
        });
        let runner = ScheduledRunner::new(&config(&[("bad", 60), ("good", 60)]), RunMonitor::new(&path), executor.clone())
            .unwrap();

        let results = runner.run_once().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, RunStatus::Failed);
        assert!(results[0].error.as_deref().unwrap().contains("bad exploded"));
        assert_eq!(results[1].status, RunStatus::Success);
        assert_eq!(results[1].detail["fetched"], 1);
        assert_eq!(*executor.calls.lock().unwrap(), ["bad", "good"]);

        let logged = log_lines(&path);
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].task, "bad");
        assert!(logged.iter().all(|r| r.duration_seconds >= 0.0 && r.finished_at >= r.started_at));
    }

    #[tokio::test]
    async fn failing_last_task_leaves_earlier_success_intact() {
        let path = log_path();
        let executor = Arc::new(FakeExecutor {
            failing: vec!["bad"],
            ..FakeExecutor::default()
        });
        let runner = ScheduledRunner::new(&config(&[("good", 60), ("bad", 60)]), RunMonitor::new(&path), executor.clone())
            .unwrap();

        let results = runner.run_once().await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].task, "good");
        assert_eq!(results[0].status, RunStatus::Success);
        assert_eq!(results[1].task, "bad");
        assert_eq!(results[1].status, RunStatus::Failed);
        assert_eq!(*executor.calls.lock().unwrap(), ["good", "bad"]);

        let logged = log_lines(&path);
        assert_eq!(logged.len(), 2);
        assert_eq!(logged[0].status, RunStatus::Success);
        assert_eq!(logged[1].status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn cycle_bound_with_zero_interval() {
        let path = log_path();
        let executor = Arc::new(FakeExecutor::default());
        let runner = ScheduledRunner::new(&config(&[("t", 0)]), RunMonitor::new(&path), executor).unwrap();

        let executions = runner.run(Some(2), Duration::ZERO).await;

        assert_eq!(executions, 2);
        assert_eq!(log_lines(&path).len(), 2);
    }

    #[tokio::test]
    async fn interval_gates_later_cycles() {
        let path = log_path();
        let executor = Arc::new(FakeExecutor::default());
        let runner = ScheduledRunner::new(
            &config(&[("hourly", 60), ("always", 0)]),
            RunMonitor::new(&path),
            executor.clone(),
        )
        .unwrap();

        let executions = runner.run(Some(3), Duration::ZERO).await;

        assert_eq!(executions, 4);
        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.iter().filter(|n| *n == "hourly").count(), 1);
        assert_eq!(calls.iter().filter(|n| *n == "always").count(), 3);
    }

    #[tokio::test]
    async fn failed_task_still_advances_next_run() {
        let path = log_path();
        let executor = Arc::new(FakeExecutor {
            failing: vec!["bad"],
            ..FakeExecutor::default()
        });
        let runner = ScheduledRunner::new(&config(&[("bad", 60)]), RunMonitor::new(&path), executor).unwrap();

        assert_eq!(runner.run(Some(3), Duration::ZERO).await, 1);
        assert_eq!(log_lines(&path).len(), 1);
    }

    #[tokio::test]
    async fn report_path_lands_in_detail() {
        let path = log_path();
        let mut config = config(&[("weekly", 60)]);
        config.tasks[0].report_output = Some(PathBuf::from("reports/weekly.md"));

        let runner = ScheduledRunner::new(&config, RunMonitor::new(&path), Arc::new(FakeExecutor::default())).unwrap();
        let results = runner.run_once().await;

        assert_eq!(results[0].status, RunStatus::Success);
        assert_eq!(results[0].detail["report_file"], "reports/weekly.md");
    }

    #[tokio::test]
    async fn report_failure_marks_task_failed() {
        let path = log_path();
        let mut config = config(&[("weekly", 60)]);
        config.tasks[0].report_output = Some(PathBuf::from("reports/weekly.md"));
        let executor = Arc::new(FakeExecutor {
            fail_report: true,
            ..FakeExecutor::default()
        });

        let runner = ScheduledRunner::new(&config, RunMonitor::new(&path), executor).unwrap();
        let results = runner.run_once().await;

        assert_eq!(results[0].status, RunStatus::Failed);
        assert!(results[0].error.as_deref().unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn unwritable_log_does_not_abort_cycle() {
        // A directory where the log file should be makes every append fail.
        let path = log_path();
        std::fs::create_dir_all(&path).unwrap();

        let runner = ScheduledRunner::new(
            &config(&[("a", 0), ("b", 0)]),
            RunMonitor::new(&path),
            Arc::new(FakeExecutor::default()),
        )
        .unwrap();

        assert_eq!(runner.run_once().await.len(), 2);
    }

    #[test]
    fn duplicate_task_names_are_rejected() {
        let result = ScheduledRunner::new(
            &config(&[("same", 60), ("same", 30)]),
            RunMonitor::new(log_path()),
            Arc::new(FakeExecutor::default()),
        );
        assert!(matches!(result, Err(ResearchError::Config { .. })));
    }

    #[test]
    fn advance_saturates() {
        let now = Utc::now();
        assert_eq!(advance(now, 0), now);
        assert_eq!(advance(now, u64::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[tokio::test]
    async fn pipeline_executor_runs_real_pipeline() {
        use wiremock::matchers::path;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<title>Page</title><p>Hello there. Bye.</p>"))
            .mount(&server)
            .await;

        let root = std::env::temp_dir().join(format!("researcher_exec_{}", Uuid::now_v7()));
        let mut config = AppConfig::default();
        config.tasks.push(TaskEntry {
            name: Some("live".into()),
            urls: vec![format!("{}/page", server.uri())],
            data_dir: Some(root.join("data")),
            report_output: Some(root.join("reports").join("live.md")),
            ..TaskEntry::default()
        });

        let executor = Arc::new(PipelineTaskExecutor::from_config(&config).unwrap());
        let runner = ScheduledRunner::new(&config, RunMonitor::new(root.join("logs/pipeline.log")), executor).unwrap();
        let results = runner.run_once().await;

        assert_eq!(results[0].status, RunStatus::Success, "{:?}", results[0].error);
        assert_eq!(results[0].detail["fetched"], 1);
        assert!(root.join("data").join("summary.jsonl").exists());
        assert!(root.join("reports").join("live.md").exists());
    }
}
