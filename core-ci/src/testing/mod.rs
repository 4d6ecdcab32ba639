//! Testing utilities for the runner.
//!
//! This module provides:
//! - A scripted in-process backend recording every call
//! - Assertions over the runner's printed output

mod assertions;
mod mocks;

pub use assertions::{
    assert_contains, assert_last_line, assert_markers_in_order, progress_markers,
};
pub use mocks::{BackendCall, ScriptedBackend};
