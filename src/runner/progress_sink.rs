//! Progress emission: the [`ProgressSink`] trait plus two concrete
//! implementations (§6).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::runner::error::RunnerError;

/// One emitted solution, covering one Driver iteration (or the final
/// record, at `iteration == -1`, per §5's cancellation/timeout handling).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub job_id: String,
    pub iteration: i64,
    pub genotype: Vec<u32>,
    pub fitness: f64,
    /// Absolute group ids assigned to each student, in declared subject order.
    pub student_groups: Vec<Vec<usize>>,
    /// `(start_timeslot, end_timeslot, room)` per group.
    pub group_assignments: Vec<(u32, u32, usize)>,
    pub student_scores: Vec<f64>,
    pub teacher_scores: Vec<f64>,
    /// One `(score, weight)` pair per category, in declared order.
    pub student_details: Vec<Vec<(f64, f64)>>,
    pub teacher_details: Vec<Vec<(f64, f64)>>,
    pub student_weighted_scores: Vec<f64>,
    pub teacher_weighted_scores: Vec<f64>,
    pub total_student_weight: f64,
    pub total_teacher_weight: f64,
    pub days_in_cycle: u32,
    pub timeslots_daily: u32,
}

/// Pluggable progress emission. Object-safe for the same reason as
/// [`crate::runner::job_source::JobSource`] — a host swaps `InMemory*` for
/// `File*` (or a future queue-backed sink) without touching the core.
pub trait ProgressSink {
    fn send_progress(&self, snapshot: ProgressSnapshot) -> Result<(), RunnerError>;
}

/// Collects snapshots in process memory, for tests and embedding.
#[derive(Default)]
pub struct InMemoryProgressSink {
    snapshots: Mutex<Vec<ProgressSnapshot>>,
}

impl InMemoryProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.snapshots.lock().expect("progress sink mutex poisoned").clone()
    }
}

impl ProgressSink for InMemoryProgressSink {
    fn send_progress(&self, snapshot: ProgressSnapshot) -> Result<(), RunnerError> {
        self.snapshots
            .lock()
            .expect("progress sink mutex poisoned")
            .push(snapshot);
        Ok(())
    }
}

/// Appends one JSON-lines record per snapshot to `path`. Never rewrites the
/// file — iteration ascending, then `-1` last, is the only ordering
/// guarantee a reader can rely on (§6).
pub struct FileProgressSink {
    path: PathBuf,
}

impl FileProgressSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ProgressSink for FileProgressSink {
    fn send_progress(&self, snapshot: ProgressSnapshot) -> Result<(), RunnerError> {
        let line = serde_json::to_string(&snapshot).map_err(|e| RunnerError::Emission(e.to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RunnerError::Emission(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| RunnerError::Emission(e.to_string()))?;
        Ok(())
    }
}
