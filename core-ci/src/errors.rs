//! Error types for the build-and-test runner.
//!
//! Command failures are tagged variants carrying the captured diagnostic
//! stream, so callers pattern-match on the kind instead of inspecting the
//! error source.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type returned by a runner invocation.
#[derive(Debug, Error)]
pub enum RunError {
    /// The configure command exited with a non-zero status.
    #[error("cmake error")]
    ConfigureFailed {
        /// Captured standard error of the configure command.
        stderr: String,
    },

    /// The build command exited with a non-zero status.
    #[error("cmake --build error")]
    BuildFailed {
        /// Captured standard error of the build command.
        stderr: String,
    },

    /// The test binary exited with a non-zero status.
    #[error("running error")]
    RunFailed {
        /// Captured standard error of the test binary.
        stderr: String,
    },

    /// The backend failed for a reason other than a command's exit status.
    #[error(transparent)]
    Transport(#[from] BackendError),

    /// The host directory view could not be built.
    #[error(transparent)]
    HostDirectory(#[from] HostDirectoryError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Writing to the report stream failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Returns the captured stderr for command failures.
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ConfigureFailed { stderr }
            | Self::BuildFailed { stderr }
            | Self::RunFailed { stderr } => Some(stderr),
            _ => None,
        }
    }

    /// Returns true if the error came from a command's exit status.
    #[must_use]
    pub fn is_command_failure(&self) -> bool {
        self.stderr().is_some()
    }
}

/// Errors raised by a container backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("failed to connect to container backend: {0}")]
    Connect(#[source] bollard::errors::Error),

    /// A backend API call failed.
    #[error("{operation} failed: {source}")]
    Api {
        /// The operation that failed (e.g. "create container").
        operation: &'static str,
        /// The underlying API error.
        #[source]
        source: bollard::errors::Error,
    },

    /// The image is not present locally and the pull policy forbids pulling.
    #[error("image '{0}' is not available locally and pulling is disabled")]
    ImageUnavailable(String),

    /// The image pull reported an error.
    #[error("failed to pull image '{image}': {message}")]
    Pull {
        /// The image reference.
        image: String,
        /// Message reported by the registry.
        message: String,
    },

    /// The backend reported a platform without an architecture component.
    #[error("malformed platform string '{0}': expected \"<os>/<arch>\"")]
    MalformedPlatform(String),

    /// A started command did not report an exit code.
    #[error("command {0:?} finished without an exit code")]
    MissingExitCode(Vec<String>),

    /// A mounted directory could not be archived.
    #[error(transparent)]
    HostDirectory(#[from] HostDirectoryError),

    /// The backend was asked about a container it does not know.
    #[error("unknown container: {0}")]
    UnknownContainer(String),
}

impl BackendError {
    /// Wraps an API error with the name of the failing operation.
    #[must_use]
    pub fn api(operation: &'static str, source: bollard::errors::Error) -> Self {
        Self::Api { operation, source }
    }
}

/// Errors raised while building a filtered host directory view.
#[derive(Debug, Error)]
pub enum HostDirectoryError {
    /// The project root does not exist or is not a directory.
    #[error("host root {0} is not a directory")]
    MissingRoot(PathBuf),

    /// An included subtree does not exist under the root.
    #[error("included path '{include}' not found under {root}")]
    MissingInclude {
        /// The host root.
        root: PathBuf,
        /// The missing include entry.
        include: String,
    },

    /// Archiving the tree failed.
    #[error("failed to archive {path}: {source}")]
    Archive {
        /// The path being archived.
        path: PathBuf,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// The file path.
        path: PathBuf,
        /// The IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the config schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The file path.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: serde_json::Error,
    },

    /// A field holds an invalid value.
    #[error("invalid config field '{field}': {reason}")]
    Invalid {
        /// The field name.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
