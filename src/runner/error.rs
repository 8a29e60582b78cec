//! The crate's single public error type (§7).

use thiserror::Error;

/// Errors surfaced across the job-intake → drive → emit pipeline, plus the
/// one core-internal programming-error path ([`Self::GenotypeShapeMismatch`])
/// that [`crate::evaluator::Evaluator::evaluate`] logs and recovers from
/// without propagating a `Result`.
///
/// An unrepairable individual (Repair returns `false`) is NOT represented
/// here — that is ordinary, high-frequency control flow inside
/// [`crate::ga::driver::Driver`], not a `RunnerError`.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("job {job_id} has an infeasible problem instance: {reasons:?}")]
    InfeasibleProblem { job_id: String, reasons: Vec<String> },

    #[error("genotype length mismatch: expected {expected}, got {actual}")]
    GenotypeShapeMismatch { expected: usize, actual: usize },

    #[error("job intake failed: {0}")]
    Intake(String),

    #[error("progress emission failed: {0}")]
    Emission(String),
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Intake(err.to_string())
    }
}

impl From<serde_json::Error> for RunnerError {
    fn from(err: serde_json::Error) -> Self {
        RunnerError::Intake(err.to_string())
    }
}
