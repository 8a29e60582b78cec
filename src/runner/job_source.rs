//! Job intake: the [`JobSource`] trait plus two concrete implementations
//! (§6).

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::model::RawProblemData;
use crate::runner::error::RunnerError;

/// One unit of work handed from intake to the job runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub job_id: String,
    pub problem: RawProblemData,
    #[serde(default = "default_max_execution_time")]
    pub max_execution_time_secs: u64,
}

fn default_max_execution_time() -> u64 {
    300
}

/// Pluggable job intake. Object-safe so a host can swap implementations —
/// filesystem polling, an in-memory queue, or (not shipped here) a message
/// broker — without the core depending on any of them directly.
pub trait JobSource {
    fn receive(&mut self) -> Result<JobRequest, RunnerError>;
    fn has_more(&mut self) -> bool;
    fn check_cancellation(&self) -> bool;
    fn current_job_id(&self) -> Option<String>;
}

/// A `VecDeque`-backed source for unit tests and embedding.
#[derive(Default)]
pub struct InMemoryJobSource {
    queue: VecDeque<JobRequest>,
    current: Option<String>,
    cancelled: bool,
}

impl InMemoryJobSource {
    pub fn new(jobs: impl IntoIterator<Item = JobRequest>) -> Self {
        Self {
            queue: jobs.into_iter().collect(),
            current: None,
            cancelled: false,
        }
    }

    pub fn push(&mut self, job: JobRequest) {
        self.queue.push_back(job);
    }

    /// Sets the cancellation flag observed by [`JobSource::check_cancellation`].
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }
}

impl JobSource for InMemoryJobSource {
    fn receive(&mut self) -> Result<JobRequest, RunnerError> {
        let job = self
            .queue
            .pop_front()
            .ok_or_else(|| RunnerError::Intake("no jobs queued".into()))?;
        self.current = Some(job.job_id.clone());
        Ok(job)
    }

    fn has_more(&mut self) -> bool {
        !self.queue.is_empty()
    }

    fn check_cancellation(&self) -> bool {
        self.cancelled
    }

    fn current_job_id(&self) -> Option<String> {
        self.current.clone()
    }
}

/// Polls a directory for `*.json` job files, parsing each as a
/// [`JobRequest`] and removing it once consumed.
///
/// Grounded in the filesystem-polling intake mode the original host
/// process offers as an alternative to a message broker (§6).
pub struct FileJobSource {
    dir: PathBuf,
    current: Option<String>,
}

impl FileJobSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, current: None }
    }

    fn pending_files(&self) -> Result<Vec<PathBuf>, RunnerError> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl JobSource for FileJobSource {
    fn receive(&mut self) -> Result<JobRequest, RunnerError> {
        let files = self.pending_files()?;
        let path = files
            .into_iter()
            .next()
            .ok_or_else(|| RunnerError::Intake("no job files pending".into()))?;

        let contents = fs::read_to_string(&path)?;
        let job: JobRequest = serde_json::from_str(&contents)?;
        fs::remove_file(&path)?;
        self.current = Some(job.job_id.clone());
        Ok(job)
    }

    fn has_more(&mut self) -> bool {
        self.pending_files().map(|files| !files.is_empty()).unwrap_or(false)
    }

    fn check_cancellation(&self) -> bool {
        false
    }

    fn current_job_id(&self) -> Option<String> {
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job(id: &str) -> JobRequest {
        JobRequest {
            job_id: id.to_string(),
            problem: RawProblemData::default(),
            max_execution_time_secs: 300,
        }
    }

    #[test]
    fn in_memory_source_yields_jobs_in_fifo_order() {
        let mut source = InMemoryJobSource::new([sample_job("a"), sample_job("b")]);
        assert!(source.has_more());
        assert_eq!(source.receive().unwrap().job_id, "a");
        assert_eq!(source.current_job_id(), Some("a".to_string()));
        assert_eq!(source.receive().unwrap().job_id, "b");
        assert!(!source.has_more());
    }

    #[test]
    fn in_memory_source_errors_when_empty() {
        let mut source = InMemoryJobSource::default();
        assert!(source.receive().is_err());
    }

    #[test]
    fn in_memory_source_reports_cancellation() {
        let mut source = InMemoryJobSource::default();
        assert!(!source.check_cancellation());
        source.cancel();
        assert!(source.check_cancellation());
    }

    #[test]
    fn file_source_reads_and_consumes_job_files() {
        let dir = tempfile::tempdir().unwrap();
        let job = sample_job("file-job");
        let path = dir.path().join("file-job.json");
        fs::write(&path, serde_json::to_string(&job).unwrap()).unwrap();

        let mut source = FileJobSource::new(dir.path().to_path_buf());
        assert!(source.has_more());
        let received = source.receive().unwrap();
        assert_eq!(received.job_id, "file-job");
        assert!(!path.exists());
        assert!(!source.has_more());
    }

    #[test]
    fn file_source_orders_multiple_jobs_by_filename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), serde_json::to_string(&sample_job("b")).unwrap()).unwrap();
        fs::write(dir.path().join("a.json"), serde_json::to_string(&sample_job("a")).unwrap()).unwrap();

        let mut source = FileJobSource::new(dir.path().to_path_buf());
        assert_eq!(source.receive().unwrap().job_id, "a");
        assert_eq!(source.receive().unwrap().job_id, "b");
    }
}
