//! Platform strings reported by a container backend.

use crate::errors::BackendError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A platform of the form `"<os>/<arch>"`, optionally followed by a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Platform(String);

impl Platform {
    /// Wraps a raw platform string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds a platform from its components.
    #[must_use]
    pub fn from_parts(os: &str, architecture: &str, variant: Option<&str>) -> Self {
        match variant {
            Some(v) if !v.is_empty() => Self(format!("{os}/{architecture}/{v}")),
            _ => Self(format!("{os}/{architecture}")),
        }
    }

    /// Returns the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns everything after the first `/`.
    ///
    /// `linux/arm64` yields `arm64`. A string without `/` or with nothing
    /// after it is rejected.
    pub fn architecture(&self) -> Result<&str, BackendError> {
        match self.0.split_once('/') {
            Some((_, arch)) if !arch.is_empty() => Ok(arch),
            _ => Err(BackendError::MalformedPlatform(self.0.clone())),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_after_first_slash() {
        assert_eq!(Platform::new("linux/arm64").architecture().unwrap(), "arm64");
        assert_eq!(Platform::new("linux/amd64").architecture().unwrap(), "amd64");
        assert_eq!(Platform::new("linux/arm/v7").architecture().unwrap(), "arm/v7");
    }

    #[test]
    fn test_malformed_platform() {
        assert!(matches!(
            Platform::new("linux").architecture(),
            Err(BackendError::MalformedPlatform(p)) if p == "linux"
        ));
        assert!(Platform::new("linux/").architecture().is_err());
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(Platform::from_parts("linux", "arm64", None).as_str(), "linux/arm64");
        assert_eq!(Platform::from_parts("linux", "arm", Some("v7")).as_str(), "linux/arm/v7");
        assert_eq!(Platform::from_parts("linux", "amd64", Some("")).as_str(), "linux/amd64");
    }
}
