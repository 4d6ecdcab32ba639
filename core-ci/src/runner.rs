//! The build-and-test runner.
//!
//! Steps run strictly in order and every failure is terminal:
//!
//! ```text
//! provision -> introspect -> mount -> configure -> build -> test -> finalize
//! ```
//!
//! Each command's result is awaited and checked before the next command is
//! issued.

use crate::backend::{ContainerBackend, DockerBackend};
use crate::config::RunnerConfig;
use crate::container::Container;
use crate::context::ExecutionContext;
use crate::core::{ExecOutput, StepKind};
use crate::errors::{BackendError, ConfigError, RunError};
use crate::observability::StepTimer;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Final line printed after a successful run.
pub const EXIT_SUCCESS_MARKER: &str = "exit_success";

/// Final line printed after a failed run.
pub const EXIT_FAILURE_MARKER: &str = "exit_failure";

/// Printed once configuration succeeded, before the build starts.
pub const RUNNING_TESTS_MARKER: &str = "Running tests in container...";

/// Printed after the test binary exited successfully.
pub const TESTS_DONE_MARKER: &str = "Tests done!";

/// Printed when the configure or build command fails for a reason other
/// than its exit status.
pub const EXEC_SYNC_ERROR_LINE: &str = "error syncing the pipeline after exec";

/// Drives one build-and-test run.
#[derive(Debug, Clone)]
pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    /// Creates a runner after validating its configuration.
    pub fn new(config: RunnerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Connects to Docker, runs, and releases the context.
    ///
    /// `base_dir` is the invocation directory the project root is relative to.
    pub async fn connect_and_run<W: Write + Send>(
        &self,
        base_dir: &Path,
        out: &mut W,
    ) -> Result<(), RunError> {
        let timer = StepTimer::start(StepKind::Connect);
        let ctx = timer.instrument(ExecutionContext::<DockerBackend>::connect(&self.config, base_dir)).await?;
        timer.finish();
        info!(project_root = %ctx.project_root().display(), "Execution context ready");
        self.run_in(ctx, out).await
    }

    /// Runs against `ctx` and closes it, whatever the outcome.
    pub async fn run_in<B, W>(&self, ctx: ExecutionContext<B>, out: &mut W) -> Result<(), RunError>
    where
        B: ContainerBackend,
        W: Write + Send,
    {
        let result = self.run(&ctx, out).await;
        ctx.close().await;
        result
    }

    /// Runs every step against an open context.
    ///
    /// Command diagnostics and test output are written to `out`; the final
    /// marker is left to [`report`].
    pub async fn run<B, W>(&self, ctx: &ExecutionContext<B>, out: &mut W) -> Result<(), RunError>
    where
        B: ContainerBackend,
        W: Write + Send,
    {
        let config = &self.config;

        let timer = StepTimer::start(StepKind::Provision);
        let container = Container::from_image(config.image.clone());
        timer.finish();

        let timer = StepTimer::start(StepKind::Introspect);
        let platform = timer.instrument(ctx.platform(&container)).await?;
        let architecture = timer.check(platform.architecture())?.to_string();
        info!(%platform, architecture = %architecture, env = %config.arch_env_var, "Injecting container architecture");
        let container = container.with_env_variable(config.arch_env_var.clone(), architecture);
        timer.finish();

        let timer = StepTimer::start(StepKind::Mount);
        let src = timer.check(ctx.host_directory(&config.include))?;
        let container = container
            .with_mounted_directory(config.mount_path.clone(), src)
            .with_workdir(config.workdir.clone());
        let id = timer.instrument(ctx.start(&container)).await?;
        timer.finish();

        let timer = StepTimer::start(StepKind::Configure);
        let output = synced(timer.instrument(ctx.exec(&id, &container, &config.configure_command)).await, out)?;
        if !output.is_success() {
            writeln!(out, "{}", output.stderr)?;
            return timer.track(Err(RunError::ConfigureFailed {
                stderr: output.stderr,
            }));
        }
        timer.finish();

        writeln!(out, "{RUNNING_TESTS_MARKER}")?;

        let timer = StepTimer::start(StepKind::Build);
        let output = synced(timer.instrument(ctx.exec(&id, &container, &config.build_invocation())).await, out)?;
        if !output.is_success() {
            writeln!(out, "{}", output.stderr)?;
            return timer.track(Err(RunError::BuildFailed {
                stderr: output.stderr,
            }));
        }
        timer.finish();

        let timer = StepTimer::start(StepKind::Test);
        let output = timer.instrument(ctx.exec(&id, &container, &config.test_command)).await?;
        writeln!(out, "{}", output.stdout)?;
        timer.finish();

        let timer = StepTimer::start(StepKind::Finalize);
        if !output.is_success() {
            writeln!(out, "{}", output.stderr)?;
            return timer.track(Err(RunError::RunFailed {
                stderr: output.stderr,
            }));
        }
        timer.finish();

        writeln!(out, "{TESTS_DONE_MARKER}")?;
        Ok(())
    }
}

/// Prints [`EXEC_SYNC_ERROR_LINE`] when a command could not be driven to
/// completion, then passes the backend error through unchanged.
fn synced<W: Write>(result: Result<ExecOutput, BackendError>, out: &mut W) -> Result<ExecOutput, RunError> {
    match result {
        Ok(output) => Ok(output),
        Err(err) => {
            writeln!(out, "{EXEC_SYNC_ERROR_LINE}")?;
            Err(err.into())
        }
    }
}

/// Writes the final lines for a run and returns the process exit status.
///
/// A failure prints its message before the failure marker.
pub fn report<W: Write>(result: &Result<(), RunError>, out: &mut W) -> std::io::Result<i32> {
    info!(step = %StepKind::Report, success = result.is_ok(), "Run finished");
    match result {
        Ok(()) => {
            writeln!(out, "{EXIT_SUCCESS_MARKER}")?;
            out.flush()?;
            Ok(0)
        }
        Err(err) => {
            writeln!(out, "{err}")?;
            writeln!(out, "{EXIT_FAILURE_MARKER}")?;
            out.flush()?;
            Ok(1)
        }
    }
}
