use crate::error::WorkflowError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Append-only log of completed step results, keyed by workflow-run id.
/// A recorded step is never executed again: resuming a crashed run replays
/// results from the journal and continues from the first missing step.
#[async_trait]
pub trait StepJournal: Send + Sync {
    async fn load(&self, run_id: &str, step_id: &str) -> Result<Option<Value>, WorkflowError>;

    async fn record(&self, run_id: &str, step_id: &str, value: Value)
        -> Result<(), WorkflowError>;
}

/// Runs a durable step: returns the journaled result when present,
/// otherwise executes the step and records its output before returning.
pub async fn run_step<T, Fut>(
    journal: &dyn StepJournal,
    run_id: &str,
    step_id: &str,
    step: Fut,
) -> Result<T, WorkflowError>
where
    T: Serialize + DeserializeOwned,
    Fut: Future<Output = Result<T, WorkflowError>> + Send,
{
    if let Some(recorded) = journal.load(run_id, step_id).await? {
        debug!(run_id, step_id, "replaying journaled step result");
        return Ok(serde_json::from_value(recorded)?);
    }

    let output = step.await?;
    journal
        .record(run_id, step_id, serde_json::to_value(&output)?)
        .await?;
    Ok(output)
}

#[derive(Debug, Serialize, Deserialize)]
struct StepRecord {
    recorded_at: DateTime<Utc>,
    value: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RunLog {
    steps: HashMap<String, StepRecord>,
}

/// One JSON file per workflow run under a state directory. Writes go
/// through a temp file and rename, so a crash mid-write leaves the
/// previous journal intact.
pub struct FileJournal {
    state_dir: PathBuf,
}

impl FileJournal {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
        }
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        let safe: String = run_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.state_dir.join(format!("{safe}.json"))
    }

    fn read_log(path: &Path) -> Result<RunLog, WorkflowError> {
        if !path.exists() {
            return Ok(RunLog::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

#[async_trait]
impl StepJournal for FileJournal {
    async fn load(&self, run_id: &str, step_id: &str) -> Result<Option<Value>, WorkflowError> {
        let log = Self::read_log(&self.run_path(run_id))?;
        Ok(log.steps.get(step_id).map(|record| record.value.clone()))
    }

    async fn record(
        &self,
        run_id: &str,
        step_id: &str,
        value: Value,
    ) -> Result<(), WorkflowError> {
        std::fs::create_dir_all(&self.state_dir)?;
        let path = self.run_path(run_id);
        let mut log = Self::read_log(&path)?;
        log.steps.insert(
            step_id.to_string(),
            StepRecord {
                recorded_at: Utc::now(),
                value,
            },
        );

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(&log)?)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process journal for tests and fire-and-forget runs.
#[derive(Default)]
pub struct MemoryJournal {
    steps: Mutex<HashMap<(String, String), Value>>,
}

#[async_trait]
impl StepJournal for MemoryJournal {
    async fn load(&self, run_id: &str, step_id: &str) -> Result<Option<Value>, WorkflowError> {
        let steps = self.steps.lock().await;
        Ok(steps.get(&(run_id.to_string(), step_id.to_string())).cloned())
    }

    async fn record(
        &self,
        run_id: &str,
        step_id: &str,
        value: Value,
    ) -> Result<(), WorkflowError> {
        let mut steps = self.steps.lock().await;
        steps.insert((run_id.to_string(), step_id.to_string()), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[tokio::test]
    async fn completed_steps_are_not_re_executed() {
        let journal = MemoryJournal::default();
        let executions = AtomicUsize::new(0);

        for _ in 0..3 {
            let count: usize = run_step(&journal, "run-1", "load-and-chunk", async {
                executions.fetch_add(1, Ordering::SeqCst);
                Ok(42usize)
            })
            .await
            .unwrap();
            assert_eq!(count, 42);
        }

        assert_eq!(executions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_runs_do_not_share_results() {
        let journal = MemoryJournal::default();

        let first: usize = run_step(&journal, "run-1", "step", async { Ok(1usize) })
            .await
            .unwrap();
        let second: usize = run_step(&journal, "run-2", "step", async { Ok(2usize) })
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn failed_steps_leave_no_record() {
        let journal = MemoryJournal::default();

        let failed: Result<usize, _> = run_step(&journal, "run-1", "step", async {
            Err(WorkflowError::Validation("boom".to_string()))
        })
        .await;
        assert!(failed.is_err());
        assert!(journal.load("run-1", "step").await.unwrap().is_none());

        let recovered: usize = run_step(&journal, "run-1", "step", async { Ok(7usize) })
            .await
            .unwrap();
        assert_eq!(recovered, 7);
    }

    #[tokio::test]
    async fn file_journal_survives_reopening() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;

        {
            let journal = FileJournal::new(dir.path());
            journal
                .record("run-9", "embed-and-search", serde_json::json!({"contexts": []}))
                .await?;
        }

        let reopened = FileJournal::new(dir.path());
        let value = reopened.load("run-9", "embed-and-search").await?;
        assert_eq!(value, Some(serde_json::json!({"contexts": []})));
        assert!(reopened.load("run-9", "other").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn run_ids_with_path_characters_are_sanitized() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let journal = FileJournal::new(dir.path());

        journal
            .record("../evil/run", "step", serde_json::json!(1))
            .await?;
        assert_eq!(
            journal.load("../evil/run", "step").await?,
            Some(serde_json::json!(1))
        );
        Ok(())
    }
}
