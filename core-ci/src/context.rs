//! The execution context: the live session with a container backend.

use crate::backend::{ContainerBackend, ContainerId, DockerBackend, ExecRequest};
use crate::config::RunnerConfig;
use crate::container::{Container, HostDirectory};
use crate::core::{ExecOutput, Platform};
use crate::errors::{BackendError, HostDirectoryError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Session with a container backend, owned by one runner invocation.
///
/// Every container started through the context is removed by [`close`],
/// in reverse start order.
///
/// [`close`]: ExecutionContext::close
pub struct ExecutionContext<B: ContainerBackend> {
    backend: B,
    project_root: PathBuf,
    started: Mutex<Vec<ContainerId>>,
}

impl ExecutionContext<DockerBackend> {
    /// Connects to the local Docker daemon.
    ///
    /// The project root is resolved against `base_dir`.
    pub async fn connect(config: &RunnerConfig, base_dir: &Path) -> Result<Self, BackendError> {
        let backend = DockerBackend::connect(config).await?;
        Ok(Self::new(backend, config.resolve_project_root(base_dir)))
    }
}

impl<B: ContainerBackend> ExecutionContext<B> {
    /// Creates a context over an existing backend.
    #[must_use]
    pub fn new(backend: B, project_root: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            project_root: project_root.into(),
            started: Mutex::new(Vec::new()),
        }
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the host project root.
    #[must_use]
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Returns a view of the project root restricted to `include`.
    ///
    /// Fails if the root or any included subtree is missing.
    pub fn host_directory(&self, include: &[String]) -> Result<HostDirectory, HostDirectoryError> {
        let view = HostDirectory::new(&self.project_root).with_include(include.iter().cloned());
        view.check()?;
        Ok(view)
    }

    /// Returns the platform of the container's image.
    pub async fn platform(&self, container: &Container) -> Result<Platform, BackendError> {
        self.backend.platform(container.image()).await
    }

    /// Starts a container from a handle and tracks it for release.
    pub async fn start(&self, container: &Container) -> Result<ContainerId, BackendError> {
        let id = self.backend.start(container).await?;
        self.started.lock().push(id.clone());
        Ok(id)
    }

    /// Runs a command in a started container, in the handle's working directory.
    pub async fn exec(
        &self,
        id: &ContainerId,
        container: &Container,
        argv: &[String],
    ) -> Result<ExecOutput, BackendError> {
        let request = ExecRequest::new(argv.to_vec()).with_workdir(container.workdir());
        self.backend.exec(id, &request).await
    }

    /// Returns the number of containers still held by the context.
    #[must_use]
    pub fn live_containers(&self) -> usize {
        self.started.lock().len()
    }

    /// Releases every container started through the context.
    ///
    /// Removal failures are logged and returned; they never stop the
    /// remaining removals.
    pub async fn close(&self) -> Vec<(ContainerId, BackendError)> {
        let ids: Vec<ContainerId> = std::mem::take(&mut *self.started.lock());
        let mut failures = Vec::new();

        for id in ids.into_iter().rev() {
            match self.backend.remove(&id).await {
                Ok(()) => debug!(container = %id, "Released container"),
                Err(err) => {
                    warn!(container = %id, error = %err, "Failed to release container");
                    failures.push((id, err));
                }
            }
        }

        failures
    }
}

impl<B: ContainerBackend> std::fmt::Debug for ExecutionContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("project_root", &self.project_root)
            .field("live_containers", &self.live_containers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockContainerBackend;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[tokio::test]
    async fn test_exec_uses_handle_workdir() {
        let mut backend = MockContainerBackend::new();
        backend
            .expect_exec()
            .withf(|id, request| {
                id.as_str() == "c1"
                    && request.argv == vec!["cmake".to_string()]
                    && request.workdir.as_deref() == Some("/project/core/tests/cmake")
            })
            .times(1)
            .returning(|_, _| Ok(ExecOutput::ok("configured")));

        let ctx = ExecutionContext::new(backend, "/repo");
        let container = Container::from_image("img").with_workdir("/project/core/tests/cmake");
        let out = ctx
            .exec(&ContainerId::new("c1"), &container, &["cmake".to_string()])
            .await
            .unwrap();
        assert_eq!(out.stdout, "configured");
    }

    #[tokio::test]
    async fn test_close_removes_in_reverse_order() {
        let mut backend = MockContainerBackend::new();
        let mut seq = Sequence::new();
        let mut next = 0;
        backend.expect_start().times(2).returning(move |_| {
            next += 1;
            Ok(ContainerId::new(format!("c{next}")))
        });
        backend
            .expect_remove()
            .with(eq(ContainerId::new("c2")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        backend
            .expect_remove()
            .with(eq(ContainerId::new("c1")))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(BackendError::UnknownContainer("c1".to_string())));

        let ctx = ExecutionContext::new(backend, "/repo");
        let container = Container::from_image("img");
        ctx.start(&container).await.unwrap();
        ctx.start(&container).await.unwrap();
        assert_eq!(ctx.live_containers(), 2);

        let failures = ctx.close().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, ContainerId::new("c1"));
        assert_eq!(ctx.live_containers(), 0);

        // A second close has nothing left to release.
        assert!(ctx.close().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_start_is_not_tracked() {
        let mut backend = MockContainerBackend::new();
        backend
            .expect_start()
            .returning(|_| Err(BackendError::ImageUnavailable("img".to_string())));
        backend.expect_remove().never();

        let ctx = ExecutionContext::new(backend, "/repo");
        assert!(ctx.start(&Container::from_image("img")).await.is_err());
        assert_eq!(ctx.live_containers(), 0);
        assert!(ctx.close().await.is_empty());
    }

    #[test]
    fn test_host_directory_is_rooted_at_project() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("core")).unwrap();
        std::fs::create_dir_all(root.path().join("deps/libz")).unwrap();

        let ctx = ExecutionContext::new(MockContainerBackend::new(), root.path());
        let dir = ctx
            .host_directory(&["core".to_string(), "deps/libz".to_string()])
            .unwrap();
        assert_eq!(dir.root(), root.path());
        assert_eq!(dir.include(), ["core", "deps/libz"]);
    }

    #[test]
    fn test_host_directory_rejects_missing_subtree() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("core")).unwrap();

        let ctx = ExecutionContext::new(MockContainerBackend::new(), root.path());
        let err = ctx
            .host_directory(&["core".to_string(), "deps/libz".to_string()])
            .unwrap_err();
        assert!(matches!(
            err,
            HostDirectoryError::MissingInclude { ref include, .. } if include == "deps/libz"
        ));
    }
}
