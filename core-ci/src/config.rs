//! Runner configuration.
//!
//! Every field has a documented default matching the project's CI layout;
//! a JSON file or CLI flags can override individual fields.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// When to pull the toolchain image before provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullPolicy {
    /// Always pull, even if the image exists locally.
    Always,
    /// Pull only when the image is missing locally.
    #[default]
    IfMissing,
    /// Never pull; a missing image is an error.
    Never,
}

/// Configuration for one build-and-test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Toolchain image reference.
    #[serde(default = "default_image")]
    pub image: String,
    /// Error ceiling passed through to Ninja with `-k`.
    #[serde(default = "default_max_build_errors")]
    pub max_build_errors: u32,
    /// Host project root, relative to the invocation directory.
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    /// Subtrees of the project root copied into the container.
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    /// Container path where the host view is mounted.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,
    /// Working directory for every command.
    #[serde(default = "default_workdir")]
    pub workdir: String,
    /// Name of the environment variable carrying the architecture.
    #[serde(default = "default_arch_env_var")]
    pub arch_env_var: String,
    /// Configure invocation.
    #[serde(default = "default_configure_command")]
    pub configure_command: Vec<String>,
    /// Build frontend invocation, without the pass-through flags.
    #[serde(default = "default_build_command")]
    pub build_command: Vec<String>,
    /// Test binary invocation.
    #[serde(default = "default_test_command")]
    pub test_command: Vec<String>,
    /// Main process keeping the container alive between commands.
    #[serde(default = "default_keepalive_command")]
    pub keepalive_command: Vec<String>,
    /// Image pull policy.
    #[serde(default)]
    pub pull_policy: PullPolicy,
}

fn default_image() -> String {
    "voxowl/cpp-build-env:14.0.0".to_string()
}

fn default_max_build_errors() -> u32 {
    999
}

fn default_project_root() -> PathBuf {
    PathBuf::from("../..")
}

fn default_include() -> Vec<String> {
    vec!["core".to_string(), "deps/libz".to_string()]
}

fn default_mount_path() -> String {
    "/project".to_string()
}

fn default_workdir() -> String {
    "/project/core/tests/cmake".to_string()
}

fn default_arch_env_var() -> String {
    "CUBZH_ARCH".to_string()
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| (*s).to_string()).collect()
}

fn default_configure_command() -> Vec<String> {
    strings(&["cmake", "-G", "Ninja", "."])
}

fn default_build_command() -> Vec<String> {
    strings(&["cmake", "--build", ".", "--clean-first"])
}

fn default_test_command() -> Vec<String> {
    strings(&["./unit_tests"])
}

fn default_keepalive_command() -> Vec<String> {
    strings(&["sleep", "infinity"])
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            max_build_errors: default_max_build_errors(),
            project_root: default_project_root(),
            include: default_include(),
            mount_path: default_mount_path(),
            workdir: default_workdir(),
            arch_env_var: default_arch_env_var(),
            configure_command: default_configure_command(),
            build_command: default_build_command(),
            test_command: default_test_command(),
            keepalive_command: default_keepalive_command(),
            pull_policy: PullPolicy::default(),
        }
    }
}

impl RunnerConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON file; absent fields keep defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sets the toolchain image.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = image.into();
        self
    }

    /// Sets the build error ceiling.
    #[must_use]
    pub fn with_max_build_errors(mut self, max: u32) -> Self {
        self.max_build_errors = max;
        self
    }

    /// Sets the host project root.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Sets the included subtrees.
    #[must_use]
    pub fn with_include<I, S>(mut self, include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the image pull policy.
    #[must_use]
    pub fn with_pull_policy(mut self, policy: PullPolicy) -> Self {
        self.pull_policy = policy;
        self
    }

    /// Returns the full build invocation.
    ///
    /// Flags after `--` reach Ninja unchanged; `-k` makes it keep going
    /// until that many jobs have failed.
    #[must_use]
    pub fn build_invocation(&self) -> Vec<String> {
        let mut argv = self.build_command.clone();
        argv.push("--".to_string());
        argv.push("-k".to_string());
        argv.push(self.max_build_errors.to_string());
        argv
    }

    /// Resolves the project root against a base directory.
    #[must_use]
    pub fn resolve_project_root(&self, base: &Path) -> PathBuf {
        if self.project_root.is_absolute() {
            self.project_root.clone()
        } else {
            base.join(&self.project_root)
        }
    }

    /// Checks that every field holds a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.trim().is_empty() {
            return Err(ConfigError::invalid("image", "must not be empty"));
        }
        if self.include.is_empty() {
            return Err(ConfigError::invalid("include", "must list at least one path"));
        }
        for entry in &self.include {
            validate_include(entry)?;
        }
        if !self.mount_path.starts_with('/') {
            return Err(ConfigError::invalid("mount_path", "must be an absolute container path"));
        }
        if !self.workdir.starts_with('/') {
            return Err(ConfigError::invalid("workdir", "must be an absolute container path"));
        }
        if self.arch_env_var.is_empty() || self.arch_env_var.contains('=') {
            return Err(ConfigError::invalid("arch_env_var", "must be a non-empty name without '='"));
        }
        for (field, argv) in [
            ("configure_command", &self.configure_command),
            ("build_command", &self.build_command),
            ("test_command", &self.test_command),
            ("keepalive_command", &self.keepalive_command),
        ] {
            if argv.is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
        }
        Ok(())
    }
}

fn validate_include(entry: &str) -> Result<(), ConfigError> {
    let path = Path::new(entry);
    if entry.is_empty() || path.is_absolute() {
        return Err(ConfigError::invalid(
            "include",
            format!("'{entry}' must be a non-empty relative path"),
        ));
    }
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(ConfigError::invalid(
            "include",
            format!("'{entry}' must stay inside the project root"),
        ));
    }
    Ok(())
}
