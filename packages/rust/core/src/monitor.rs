//! Append-only run log of [`RunResult`] records (one JSON object per line).

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;

use researcher_shared::{ResearchError, Result, RunResult};

/// Times task executions and appends their results to the run log.
#[derive(Debug, Clone)]
pub struct RunMonitor {
    log_path: PathBuf,
}

impl RunMonitor {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn start(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// Finish time and elapsed seconds since `start`. A clock that stepped
    /// backwards yields `start` itself and zero seconds.
    pub fn finish(&self, start: DateTime<Utc>) -> (DateTime<Utc>, f64) {
        let finished = Utc::now().max(start);
        let duration = (finished - start)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        (finished, duration)
    }

    /// Append `result` as one line, creating the log's parent directories.
    pub async fn record(&self, result: &RunResult) -> Result<()> {
        let mut line = serde_json::to_string(result)
            .map_err(|e| ResearchError::Storage(format!("failed to encode run result: {e}")))?;
        line.push('\n');

        if let Some(parent) = self.log_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ResearchError::io(parent, e))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .await
            .map_err(|e| ResearchError::io(&self.log_path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ResearchError::io(&self.log_path, e))?;
        file.flush().await.map_err(|e| ResearchError::io(&self.log_path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use researcher_shared::RunStatus;
    use uuid::Uuid;

    fn result(task: &str, status: RunStatus) -> RunResult {
        let now = Utc::now();
        RunResult {
            run_id: Uuid::now_v7(),
            task: task.into(),
            status,
            started_at: now,
            finished_at: now,
            duration_seconds: 0.0,
            detail: serde_json::Map::new(),
            error: None,
        }
    }

    #[tokio::test]
    async fn record_appends_lines_and_creates_dirs() {
        let path = std::env::temp_dir()
            .join(format!("researcher_monitor_{}", Uuid::now_v7()))
            .join("logs")
            .join("pipeline.log");
        let monitor = RunMonitor::new(&path);

        monitor.record(&result("a", RunStatus::Success)).await.unwrap();
        monitor.record(&result("b", RunStatus::Failed)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<RunResult> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].task, "a");
        assert_eq!(lines[1].status, RunStatus::Failed);
    }

    #[test]
    fn finish_never_goes_negative() {
        let monitor = RunMonitor::new("unused.log");
        let future = Utc::now() + Duration::seconds(30);
        let (finished, duration) = monitor.finish(future);
        assert_eq!(finished, future);
        assert_eq!(duration, 0.0);

        let start = monitor.start();
        let (finished, duration) = monitor.finish(start);
        assert!(finished >= start);
        assert!(duration >= 0.0);
    }
}
