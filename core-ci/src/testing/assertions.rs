//! Assertions over the runner's printed output.

use crate::runner::{
    EXIT_FAILURE_MARKER, EXIT_SUCCESS_MARKER, RUNNING_TESTS_MARKER, TESTS_DONE_MARKER,
};

/// Returns the progress and final markers found in `output`, in order.
#[must_use]
pub fn progress_markers(output: &str) -> Vec<&str> {
    let markers = [
        RUNNING_TESTS_MARKER,
        TESTS_DONE_MARKER,
        EXIT_SUCCESS_MARKER,
        EXIT_FAILURE_MARKER,
    ];
    output
        .lines()
        .filter(|line| markers.contains(line))
        .collect()
}

/// Asserts that the last non-empty line of `output` equals `expected`.
pub fn assert_last_line(output: &str, expected: &str) {
    let last = output.lines().rev().find(|line| !line.is_empty());
    assert_eq!(
        last,
        Some(expected),
        "Expected last line {:?}, output was:\n{}",
        expected,
        output
    );
}

/// Asserts that `output` contains `needle`.
pub fn assert_contains(output: &str, needle: &str) {
    assert!(
        output.contains(needle),
        "Expected output to contain {:?}, output was:\n{}",
        needle,
        output
    );
}

/// Asserts that every marker appears as a whole line, in the given order.
pub fn assert_markers_in_order(output: &str, expected: &[&str]) {
    let lines: Vec<&str> = output.lines().collect();
    let mut from = 0;
    for marker in expected {
        match lines[from..].iter().position(|line| line == marker) {
            Some(offset) => from += offset + 1,
            None => panic!(
                "Expected marker {:?} after line {}, output was:\n{}",
                marker, from, output
            ),
        }
    }
}
