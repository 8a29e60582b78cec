//! Host-process plumbing around the optimization core: job intake,
//! progress emission, configuration, and the outer per-job loop (§6, §7).

pub mod config;
pub mod error;
pub mod job_runner;
pub mod job_source;
pub mod progress_sink;

pub use config::{RunnerCli, RunnerConfig};
pub use error::RunnerError;
pub use job_runner::JobRunner;
pub use job_source::{FileJobSource, InMemoryJobSource, JobRequest, JobSource};
pub use progress_sink::{FileProgressSink, InMemoryProgressSink, ProgressSink, ProgressSnapshot};
