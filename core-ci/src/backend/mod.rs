//! Container backends.
//!
//! The runner talks to a backend only through [`ContainerBackend`], so a
//! scripted implementation can stand in for Docker in tests.

mod docker;

pub use docker::DockerBackend;

use crate::container::Container;
use crate::core::{ExecOutput, Platform};
use crate::errors::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a container started by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(String);

impl ContainerId {
    /// Wraps a backend identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A command to run inside a started container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    /// Program and arguments.
    pub argv: Vec<String>,
    /// Working directory; the container default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

impl ExecRequest {
    /// Creates a request running `argv` in the container's default directory.
    #[must_use]
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv, workdir: None }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_workdir(mut self, workdir: Option<&str>) -> Self {
        self.workdir = workdir.map(str::to_string);
        self
    }

    /// Returns the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        self.argv.first().map_or("", String::as_str)
    }
}

/// Operations the runner needs from a container-execution backend.
///
/// Every call completes before it returns; there is no deferred evaluation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Makes the image available and returns its `"<os>/<arch>"` platform.
    async fn platform(&self, image: &str) -> Result<Platform, BackendError>;

    /// Creates and starts a container from a handle, copying in its mounts.
    async fn start(&self, container: &Container) -> Result<ContainerId, BackendError>;

    /// Runs a command to completion and returns its captured result.
    ///
    /// A non-zero exit status is a successful call; only transport problems
    /// are errors.
    async fn exec(&self, id: &ContainerId, request: &ExecRequest) -> Result<ExecOutput, BackendError>;

    /// Force-removes a container.
    async fn remove(&self, id: &ContainerId) -> Result<(), BackendError>;
}
