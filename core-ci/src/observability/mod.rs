//! Logging setup and per-step timing.

mod logging;
mod timer;

pub use logging::{init_logging, LogFormat};
pub use timer::StepTimer;
