//! Immutable container handle.

use super::HostDirectory;
use crate::errors::HostDirectoryError;

/// A host directory mounted at a container path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mount {
    /// Absolute container path.
    pub path: String,
    /// The host view copied there.
    pub source: HostDirectory,
}

impl Mount {
    /// Builds the tar archive to extract at the container root.
    ///
    /// Entries are prefixed with the mount path so the target directory
    /// does not need to exist in the image.
    pub fn archive(&self) -> Result<Vec<u8>, HostDirectoryError> {
        self.source.archive(self.path.trim_matches('/'))
    }
}

/// One step of container configuration.
///
/// Every `with_*` method consumes the handle and returns a new one, so a
/// handle is never mutated after another step has derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    image: String,
    env: Vec<(String, String)>,
    mounts: Vec<Mount>,
    workdir: Option<String>,
}

impl Container {
    /// Describes a container instantiated from an image.
    #[must_use]
    pub fn from_image(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            env: Vec::new(),
            mounts: Vec::new(),
            workdir: None,
        }
    }

    /// Sets an environment variable, replacing any previous value.
    #[must_use]
    pub fn with_env_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.env.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.env.push((name, value)),
        }
        self
    }

    /// Mounts a host directory view at a container path.
    ///
    /// A later mount at the same path replaces the earlier one.
    #[must_use]
    pub fn with_mounted_directory(mut self, path: impl Into<String>, source: HostDirectory) -> Self {
        let path = path.into();
        self.mounts.retain(|m| m.path != path);
        self.mounts.push(Mount { path, source });
        self
    }

    /// Sets the working directory.
    #[must_use]
    pub fn with_workdir(mut self, path: impl Into<String>) -> Self {
        self.workdir = Some(path.into());
        self
    }

    /// Returns the image reference.
    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Returns the value of an environment variable.
    #[must_use]
    pub fn env_variable(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the environment as `KEY=VALUE` strings, in insertion order.
    #[must_use]
    pub fn env_list(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }

    /// Returns the mounts.
    #[must_use]
    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    /// Returns the working directory.
    #[must_use]
    pub fn workdir(&self) -> Option<&str> {
        self.workdir.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_each_step_derives_a_new_handle() {
        let base = Container::from_image("toolchain:1");
        let with_env = base.clone().with_env_variable("CUBZH_ARCH", "arm64");

        assert_eq!(base.env_variable("CUBZH_ARCH"), None);
        assert_eq!(with_env.env_variable("CUBZH_ARCH"), Some("arm64"));
        assert_eq!(with_env.image(), "toolchain:1");
    }

    #[test]
    fn test_env_variable_replaces() {
        let container = Container::from_image("img")
            .with_env_variable("A", "1")
            .with_env_variable("B", "2")
            .with_env_variable("A", "3");

        assert_eq!(container.env_list(), vec!["A=3", "B=2"]);
    }

    #[test]
    fn test_mount_and_workdir() {
        let dir = HostDirectory::new("/src").with_include(["core"]);
        let container = Container::from_image("img")
            .with_mounted_directory("/project", dir.clone())
            .with_workdir("/project/core/tests/cmake");

        assert_eq!(container.mounts().len(), 1);
        assert_eq!(container.mounts()[0].path, "/project");
        assert_eq!(container.mounts()[0].source, dir);
        assert_eq!(container.workdir(), Some("/project/core/tests/cmake"));
    }

    #[test]
    fn test_remount_replaces() {
        let container = Container::from_image("img")
            .with_mounted_directory("/project", HostDirectory::new("/a"))
            .with_mounted_directory("/project", HostDirectory::new("/b"));

        assert_eq!(container.mounts().len(), 1);
        assert_eq!(container.mounts()[0].source.root(), std::path::Path::new("/b"));
    }
}
