//! # core-ci
//!
//! Continuous-integration driver that builds the native core inside a
//! toolchain container and runs its unit-test binary.
//!
//! The run is a strict sequence of steps against a container backend:
//!
//! - **Introspect**: read the image platform and inject its architecture
//! - **Mount**: copy a filtered view of the host tree into the container
//! - **Configure / Build**: run CMake, stopping on the first failure
//! - **Test**: run the test binary and print its output
//!
//! Success and failure are reported through the last stdout line and the
//! process exit status.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use core_ci::prelude::*;
//!
//! let runner = Runner::new(RunnerConfig::default())?;
//! let result = runner.connect_and_run(&std::env::current_dir()?, &mut std::io::stdout()).await;
//! let code = report(&result, &mut std::io::stdout())?;
//! std::process::exit(code);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod backend;
pub mod cli;
pub mod config;
pub mod container;
pub mod context;
pub mod core;
pub mod errors;
pub mod observability;
pub mod runner;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{ContainerBackend, ContainerId, DockerBackend, ExecRequest};
    pub use crate::config::{PullPolicy, RunnerConfig};
    pub use crate::container::{Container, HostDirectory, Mount};
    pub use crate::context::ExecutionContext;
    pub use crate::core::{ExecOutput, Platform, StepKind};
    pub use crate::errors::{BackendError, ConfigError, HostDirectoryError, RunError};
    pub use crate::observability::{init_logging, LogFormat, StepTimer};
    pub use crate::runner::{
        report, Runner, EXIT_FAILURE_MARKER, EXIT_SUCCESS_MARKER, RUNNING_TESTS_MARKER,
        TESTS_DONE_MARKER,
    };
}
