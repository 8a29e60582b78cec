//! `RunnerConfig`: layered host-process configuration (§6).
//!
//! Precedence is defaults < `timetable.toml` < `TIMETABLE_*` environment
//! variables < CLI flags, applied in that order by [`RunnerConfig::load`]
//! and [`RunnerConfig::apply_cli`].

use std::path::PathBuf;

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::runner::error::RunnerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    pub jobs_dir: PathBuf,
    pub progress_path: PathBuf,
    pub default_max_execution_time_secs: u64,
    pub seed: Option<u64>,
    pub log_level: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from("jobs"),
            progress_path: PathBuf::from("progress.jsonl"),
            default_max_execution_time_secs: 300,
            seed: None,
            log_level: "info".to_string(),
        }
    }
}

impl RunnerConfig {
    /// Layers defaults, an optional `timetable.toml` in the current
    /// directory, then `TIMETABLE_*` environment variables.
    pub fn load() -> Result<Self, RunnerError> {
        let defaults = RunnerConfig::default();
        let builder = Config::builder()
            .set_default("jobs_dir", defaults.jobs_dir.to_string_lossy().to_string())
            .map_err(config_err)?
            .set_default("progress_path", defaults.progress_path.to_string_lossy().to_string())
            .map_err(config_err)?
            .set_default("default_max_execution_time_secs", defaults.default_max_execution_time_secs)
            .map_err(config_err)?
            .set_default("log_level", defaults.log_level.clone())
            .map_err(config_err)?
            .add_source(File::with_name("timetable.toml").required(false))
            .add_source(Environment::with_prefix("TIMETABLE"));

        let config = builder.build().map_err(config_err)?;
        config.try_deserialize().map_err(config_err)
    }

    /// Overlays CLI flags on top of an already-layered config, following
    /// the documented precedence (CLI wins over everything).
    pub fn apply_cli(mut self, cli: &RunnerCli) -> Self {
        if let Some(jobs_dir) = &cli.jobs_dir {
            self.jobs_dir = jobs_dir.clone();
        }
        if let Some(progress_path) = &cli.progress_path {
            self.progress_path = progress_path.clone();
        }
        if let Some(seed) = cli.seed {
            self.seed = Some(seed);
        }
        if let Some(max_execution_time) = cli.max_execution_time {
            self.default_max_execution_time_secs = max_execution_time;
        }
        if cli.verbose {
            self.log_level = "debug".to_string();
        }
        self
    }
}

fn config_err(err: config::ConfigError) -> RunnerError {
    RunnerError::Intake(err.to_string())
}

/// Thin CLI overlay for the `timetable-runner` host binary.
#[derive(Debug, Parser)]
#[command(name = "timetable-runner", about = "Batch timetabling optimizer host")]
pub struct RunnerCli {
    #[arg(long)]
    pub jobs_dir: Option<PathBuf>,

    #[arg(long)]
    pub progress_path: Option<PathBuf>,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub max_execution_time: Option<u64>,

    #[arg(short, long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let defaults = RunnerConfig::default();
        assert_eq!(defaults.default_max_execution_time_secs, 300);
        assert_eq!(defaults.log_level, "info");
        assert_eq!(defaults.seed, None);
    }

    #[test]
    fn cli_overlay_overrides_loaded_values() {
        let base = RunnerConfig::default();
        let cli = RunnerCli {
            jobs_dir: Some(PathBuf::from("/tmp/custom-jobs")),
            progress_path: None,
            seed: Some(42),
            max_execution_time: None,
            verbose: true,
        };
        let merged = base.apply_cli(&cli);
        assert_eq!(merged.jobs_dir, PathBuf::from("/tmp/custom-jobs"));
        assert_eq!(merged.seed, Some(42));
        assert_eq!(merged.log_level, "debug");
        assert_eq!(merged.progress_path, PathBuf::from("progress.jsonl"));
    }

    #[test]
    fn cli_overlay_is_noop_when_nothing_set() {
        let base = RunnerConfig::default();
        let cli = RunnerCli {
            jobs_dir: None,
            progress_path: None,
            seed: None,
            max_execution_time: None,
            verbose: false,
        };
        let merged = base.clone().apply_cli(&cli);
        assert_eq!(merged.jobs_dir, base.jobs_dir);
        assert_eq!(merged.log_level, base.log_level);
    }

    /// Environment variables sit above the built-in default and below a CLI
    /// flag (§6). `config`/`std::env` are process-global, so this test
    /// cleans up after itself rather than relying on test isolation.
    #[test]
    fn environment_variable_overrides_default_but_cli_still_wins() {
        std::env::set_var("TIMETABLE_DEFAULT_MAX_EXECUTION_TIME_SECS", "600");
        let loaded = RunnerConfig::load();
        std::env::remove_var("TIMETABLE_DEFAULT_MAX_EXECUTION_TIME_SECS");

        let loaded = loaded.expect("layered config must build from defaults + env alone");
        assert_eq!(loaded.default_max_execution_time_secs, 600);

        let cli = RunnerCli {
            jobs_dir: None,
            progress_path: None,
            seed: None,
            max_execution_time: Some(900),
            verbose: false,
        };
        let merged = loaded.apply_cli(&cli);
        assert_eq!(merged.default_max_execution_time_secs, 900);
    }
}
