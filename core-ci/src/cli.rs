//! CLI argument parsing

use crate::config::{PullPolicy, RunnerConfig};
use crate::errors::ConfigError;
use crate::observability::LogFormat;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "core-ci")]
#[command(author, version, about = "Build the native core in a toolchain container and run its unit tests", long_about = None)]
pub struct Args {
    /// JSON configuration file; absent fields keep their defaults
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Toolchain image reference
    #[arg(long, env = "CORE_CI_IMAGE")]
    pub image: Option<String>,

    /// Error ceiling passed through to the build tool
    #[arg(long, env = "CORE_CI_MAX_BUILD_ERRORS")]
    pub max_build_errors: Option<u32>,

    /// Project root, relative to the current directory
    #[arg(long, env = "CORE_CI_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Image pull policy
    #[arg(long, value_enum)]
    pub pull: Option<PullArg>,

    /// Emit log events as JSON
    #[arg(long)]
    pub json_logs: bool,
}

/// Image pull policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PullArg {
    /// Always pull
    Always,
    /// Pull when missing locally
    IfMissing,
    /// Never pull
    Never,
}

impl From<PullArg> for PullPolicy {
    fn from(arg: PullArg) -> Self {
        match arg {
            PullArg::Always => Self::Always,
            PullArg::IfMissing => Self::IfMissing,
            PullArg::Never => Self::Never,
        }
    }
}

impl Args {
    /// Builds the runner configuration: defaults, then the file, then flags.
    pub fn runner_config(&self) -> Result<RunnerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RunnerConfig::from_file(path)?,
            None => RunnerConfig::default(),
        };
        if let Some(image) = &self.image {
            config = config.with_image(image.clone());
        }
        if let Some(max) = self.max_build_errors {
            config = config.with_max_build_errors(max);
        }
        if let Some(root) = &self.project_root {
            config = config.with_project_root(root.clone());
        }
        if let Some(pull) = self.pull {
            config = config.with_pull_policy(pull.into());
        }
        Ok(config)
    }

    /// Returns the requested log format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        if self.json_logs {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}
