//! Docker Engine backend.

use super::{ContainerBackend, ContainerId, ExecRequest};
use crate::config::{PullPolicy, RunnerConfig};
use crate::container::Container;
use crate::core::{ExecOutput, Platform};
use crate::errors::BackendError;
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, RemoveContainerOptions, StartContainerOptions,
    UploadToContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::models::ImageInspect;
use bollard::Docker;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Delay between exec inspections while waiting for a process to finish.
const EXEC_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Prefix of every container name created by this backend.
const CONTAINER_NAME_PREFIX: &str = "core-ci";

/// Backend driving a local Docker daemon.
pub struct DockerBackend {
    docker: Docker,
    pull_policy: PullPolicy,
    keepalive_command: Vec<String>,
}

impl std::fmt::Debug for DockerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerBackend")
            .field("pull_policy", &self.pull_policy)
            .field("keepalive_command", &self.keepalive_command)
            .finish_non_exhaustive()
    }
}

impl DockerBackend {
    /// Connects to the daemon using the local defaults and checks it answers.
    pub async fn connect(config: &RunnerConfig) -> Result<Self, BackendError> {
        let docker = Docker::connect_with_local_defaults().map_err(BackendError::Connect)?;
        let version = docker.version().await.map_err(BackendError::Connect)?;
        info!(
            version = version.version.as_deref().unwrap_or("unknown"),
            api_version = version.api_version.as_deref().unwrap_or("unknown"),
            "Connected to Docker daemon"
        );

        Ok(Self {
            docker,
            pull_policy: config.pull_policy,
            keepalive_command: config.keepalive_command.clone(),
        })
    }

    async fn ensure_image(&self, image: &str) -> Result<ImageInspect, BackendError> {
        if self.pull_policy == PullPolicy::Always {
            self.pull(image).await?;
        }

        match self.docker.inspect_image(image).await {
            Ok(inspect) => Ok(inspect),
            Err(e) if is_not_found(&e) => {
                if self.pull_policy == PullPolicy::Never {
                    return Err(BackendError::ImageUnavailable(image.to_string()));
                }
                self.pull(image).await?;
                self.docker
                    .inspect_image(image)
                    .await
                    .map_err(|e| BackendError::api("inspect image", e))
            }
            Err(e) => Err(BackendError::api("inspect image", e)),
        }
    }

    async fn pull(&self, image: &str) -> Result<(), BackendError> {
        info!(image, "Pulling image");
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };

        let mut progress = self.docker.create_image(Some(options), None, None);
        while let Some(item) = progress.next().await {
            let info = item.map_err(|e| BackendError::api("pull image", e))?;
            if let Some(message) = info.error {
                return Err(BackendError::Pull {
                    image: image.to_string(),
                    message,
                });
            }
            if let Some(status) = info.status {
                debug!(
                    image,
                    layer = info.id.as_deref().unwrap_or(""),
                    progress = info.progress.as_deref().unwrap_or(""),
                    "{}",
                    status
                );
            }
        }
        info!(image, "Image pulled");
        Ok(())
    }

    async fn upload_and_start(&self, id: &ContainerId, archives: Vec<(String, Vec<u8>)>) -> Result<(), BackendError> {
        for (path, archive) in archives {
            info!(
                container = %id,
                path = %path,
                bytes = archive.len(),
                "Copying host directory into container"
            );
            let options = UploadToContainerOptions {
                path: "/".to_string(),
                ..Default::default()
            };
            self.docker
                .upload_to_container(id.as_str(), Some(options), Bytes::from(archive))
                .await
                .map_err(|e| BackendError::api("copy host directory", e))?;
        }

        self.docker
            .start_container(id.as_str(), None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| BackendError::api("start container", e))
    }
}

/// Archives every mount of `container`, keyed by its container path.
fn mount_archives(container: &Container) -> Result<Vec<(String, Vec<u8>)>, BackendError> {
    container
        .mounts()
        .iter()
        .map(|mount| Ok::<_, BackendError>((mount.path.clone(), mount.archive()?)))
        .collect()
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(
        err,
        DockerError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

#[async_trait]
impl ContainerBackend for DockerBackend {
    async fn platform(&self, image: &str) -> Result<Platform, BackendError> {
        let inspect = self.ensure_image(image).await?;
        let platform = Platform::from_parts(
            inspect.os.as_deref().unwrap_or_default(),
            inspect.architecture.as_deref().unwrap_or_default(),
            inspect.variant.as_deref(),
        );
        debug!(image, %platform, "Resolved image platform");
        Ok(platform)
    }

    async fn start(&self, container: &Container) -> Result<ContainerId, BackendError> {
        let archives = mount_archives(container)?;
        let name = format!("{CONTAINER_NAME_PREFIX}-{}", Uuid::new_v4());
        let config = Config {
            image: Some(container.image().to_string()),
            env: Some(container.env_list()),
            working_dir: container.workdir().map(str::to_string),
            entrypoint: Some(self.keepalive_command.clone()),
            ..Default::default()
        };
        let options = CreateContainerOptions {
            name: name.clone(),
            platform: None,
        };

        let created = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| BackendError::api("create container", e))?;
        for warning in &created.warnings {
            warn!(container = %name, "{}", warning);
        }

        let id = ContainerId::new(created.id);
        info!(container = %id, name = %name, image = container.image(), "Created container");

        if let Err(err) = self.upload_and_start(&id, archives).await {
            if let Err(cleanup) = self.remove(&id).await {
                warn!(container = %id, error = %cleanup, "Failed to remove container after start failure");
            }
            return Err(err);
        }
        Ok(id)
    }

    async fn exec(&self, id: &ContainerId, request: &ExecRequest) -> Result<ExecOutput, BackendError> {
        info!(container = %id, command = ?request.argv, "Executing command");
        let options = CreateExecOptions {
            cmd: Some(request.argv.clone()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            working_dir: request.workdir.clone(),
            ..Default::default()
        };

        let exec = self
            .docker
            .create_exec(id.as_str(), options)
            .await
            .map_err(|e| BackendError::api("create exec", e))?;
        let started = self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| BackendError::api("start exec", e))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(chunk) = output.next().await {
                match chunk.map_err(|e| BackendError::api("read exec output", e))? {
                    LogOutput::StdOut { message } | LogOutput::Console { message } => {
                        stdout.extend_from_slice(&message);
                    }
                    LogOutput::StdErr { message } => stderr.extend_from_slice(&message),
                    LogOutput::StdIn { .. } => {}
                }
            }
        }

        // The output stream can close before the daemon records the exit code.
        let exit_code = loop {
            let inspect = self
                .docker
                .inspect_exec(&exec.id)
                .await
                .map_err(|e| BackendError::api("inspect exec", e))?;
            if inspect.running != Some(true) {
                break inspect.exit_code;
            }
            tokio::time::sleep(EXEC_POLL_INTERVAL).await;
        };
        let exit_code = exit_code.ok_or_else(|| BackendError::MissingExitCode(request.argv.clone()))?;

        info!(container = %id, program = request.program(), exit_code, "Command finished");
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }

    async fn remove(&self, id: &ContainerId) -> Result<(), BackendError> {
        let options = RemoveContainerOptions {
            force: true,
            v: true,
            ..Default::default()
        };
        self.docker
            .remove_container(id.as_str(), Some(options))
            .await
            .map_err(|e| BackendError::api("remove container", e))?;
        info!(container = %id, "Removed container");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::HostDirectory;

    #[test]
    fn test_not_found_detection() {
        let missing = DockerError::DockerResponseServerError {
            status_code: 404,
            message: "No such image".to_string(),
        };
        let denied = DockerError::DockerResponseServerError {
            status_code: 403,
            message: "denied".to_string(),
        };
        assert!(is_not_found(&missing));
        assert!(!is_not_found(&denied));
    }

    #[test]
    fn test_mount_archives_fail_before_any_daemon_call() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("core")).unwrap();
        let view = HostDirectory::new(root.path()).with_include(["core", "deps/libz"]);
        let container = Container::from_image("img").with_mounted_directory("/project", view);

        assert!(matches!(
            mount_archives(&container),
            Err(BackendError::HostDirectory(_))
        ));
    }

    #[test]
    fn test_mount_archives_keyed_by_container_path() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("core")).unwrap();
        std::fs::write(root.path().join("core/shape.c"), "int shape;").unwrap();
        let view = HostDirectory::new(root.path()).with_include(["core"]);
        let container = Container::from_image("img").with_mounted_directory("/project", view);

        let archives = mount_archives(&container).unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].0, "/project");
        assert!(!archives[0].1.is_empty());
    }
}
