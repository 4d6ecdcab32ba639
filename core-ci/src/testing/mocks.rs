//! Scripted backend for exercising the runner without a daemon.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::{ContainerBackend, ContainerId, ExecRequest};
use crate::container::Container;
use crate::core::{ExecOutput, Platform};
use crate::errors::BackendError;

/// One call received by a [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `platform(image)`.
    Platform(String),
    /// `start(container)`.
    Start(Container),
    /// `exec(id, request)`.
    Exec(ContainerId, ExecRequest),
    /// `remove(id)`.
    Remove(ContainerId),
}

#[derive(Debug, Default)]
struct State {
    platform: Option<String>,
    results: HashMap<Vec<String>, ExecOutput>,
    broken_commands: Vec<Vec<String>>,
    fail_start: bool,
    calls: Vec<BackendCall>,
    next_id: usize,
}

/// A backend answering from a script and recording every call.
///
/// Clones share the same script and call log, so a test can keep one clone
/// and hand the other to an execution context. Commands without a scripted
/// result succeed with empty output.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    state: Arc<Mutex<State>>,
}

impl ScriptedBackend {
    /// Creates a backend reporting `linux/amd64`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the platform string reported for every image.
    #[must_use]
    pub fn with_platform(self, platform: impl Into<String>) -> Self {
        self.state.lock().platform = Some(platform.into());
        self
    }

    /// Scripts the result of one exact command.
    #[must_use]
    pub fn with_exec_result<I, S>(self, argv: I, output: ExecOutput) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv = argv.into_iter().map(Into::into).collect();
        self.state.lock().results.insert(argv, output);
        self
    }

    /// Makes one exact command fail at the transport level.
    #[must_use]
    pub fn with_broken_command<I, S>(self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let argv = argv.into_iter().map(Into::into).collect();
        self.state.lock().broken_commands.push(argv);
        self
    }

    /// Makes `start` fail.
    #[must_use]
    pub fn with_failing_start(self) -> Self {
        self.state.lock().fail_start = true;
        self
    }

    /// Returns every call received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Returns the argv of every executed command, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<Vec<String>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Exec(_, request) => Some(request.argv.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns every container handle passed to `start`.
    #[must_use]
    pub fn started(&self) -> Vec<Container> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Start(container) => Some(container.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns the ids passed to `remove`.
    #[must_use]
    pub fn removed(&self) -> Vec<ContainerId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Remove(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clears the call log, keeping the script.
    pub fn reset(&self) {
        self.state.lock().calls.clear();
    }
}

#[async_trait]
impl ContainerBackend for ScriptedBackend {
    async fn platform(&self, image: &str) -> Result<Platform, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Platform(image.to_string()));
        Ok(Platform::new(
            state.platform.clone().unwrap_or_else(|| "linux/amd64".to_string()),
        ))
    }

    async fn start(&self, container: &Container) -> Result<ContainerId, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Start(container.clone()));
        if state.fail_start {
            return Err(BackendError::ImageUnavailable(container.image().to_string()));
        }
        for mount in container.mounts() {
            mount.archive()?;
        }
        state.next_id += 1;
        Ok(ContainerId::new(format!("scripted-{}", state.next_id)))
    }

    async fn exec(&self, id: &ContainerId, request: &ExecRequest) -> Result<ExecOutput, BackendError> {
        let mut state = self.state.lock();
        state.calls.push(BackendCall::Exec(id.clone(), request.clone()));
        if state.broken_commands.contains(&request.argv) {
            return Err(BackendError::MissingExitCode(request.argv.clone()));
        }
        Ok(state.results.get(&request.argv).cloned().unwrap_or_default())
    }

    async fn remove(&self, id: &ContainerId) -> Result<(), BackendError> {
        self.state.lock().calls.push(BackendCall::Remove(id.clone()));
        Ok(())
    }
}
