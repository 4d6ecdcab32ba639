//! Runner step kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the linear build-and-test flow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Open the execution context.
    Connect,
    /// Describe the container from the toolchain image.
    Provision,
    /// Read the platform and inject the architecture.
    Introspect,
    /// Mount the filtered host tree and set the working directory.
    Mount,
    /// Run the configure command.
    Configure,
    /// Run the build command.
    Build,
    /// Run the test binary and capture its output.
    Test,
    /// Check the test binary's exit status.
    Finalize,
    /// Print the final marker.
    Report,
}

impl StepKind {
    /// All steps in execution order.
    pub const ALL: [Self; 9] = [
        Self::Connect,
        Self::Provision,
        Self::Introspect,
        Self::Mount,
        Self::Configure,
        Self::Build,
        Self::Test,
        Self::Finalize,
        Self::Report,
    ];

    /// Returns true if the step runs a command inside the container.
    #[must_use]
    pub fn runs_command(&self) -> bool {
        matches!(self, Self::Configure | Self::Build | Self::Test)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Provision => write!(f, "provision"),
            Self::Introspect => write!(f, "introspect"),
            Self::Mount => write!(f, "mount"),
            Self::Configure => write!(f, "configure"),
            Self::Build => write!(f, "build"),
            Self::Test => write!(f, "test"),
            Self::Finalize => write!(f, "finalize"),
            Self::Report => write!(f, "report"),
        }
    }
}
