//! Core domain types for the runner.
//!
//! This module contains the values passed between the runner and a backend:
//! - Runner step kinds
//! - Command results
//! - Platform strings reported by the backend

mod exec;
mod platform;
mod step;

pub use exec::ExecOutput;
pub use platform::Platform;
pub use step::StepKind;
