//! `timetable-runner`: a filesystem-polling host for the optimization core.
//!
//! Watches `jobs_dir` for `*.json` job files, runs each to completion, and
//! appends one JSON-lines progress record per iteration to `progress_path`.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use u_timetable::runner::{FileJobSource, FileProgressSink, JobRunner, RunnerCli, RunnerConfig};

fn main() -> anyhow::Result<()> {
    let cli = RunnerCli::parse();
    let config = RunnerConfig::load()
        .context("loading runner configuration")?
        .apply_cli(&cli);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    std::fs::create_dir_all(&config.jobs_dir)
        .with_context(|| format!("creating jobs directory {}", config.jobs_dir.display()))?;

    let mut source = FileJobSource::new(config.jobs_dir.clone());
    let sink = FileProgressSink::new(config.progress_path.clone());
    let runner = JobRunner::new(config.seed);

    runner.run_all(&mut source, &sink);

    Ok(())
}
