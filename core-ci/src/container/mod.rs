//! Container handles and host directory views.
//!
//! A [`Container`] describes configuration only; nothing touches the backend
//! until the execution context starts it.

mod handle;
mod host;

pub use handle::{Container, Mount};
pub use host::HostDirectory;
