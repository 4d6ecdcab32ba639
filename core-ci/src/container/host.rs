//! Filtered host directory views.

use crate::errors::HostDirectoryError;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A view of a host directory restricted to an include list.
///
/// With an empty include list the whole root is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDirectory {
    root: PathBuf,
    include: Vec<String>,
}

impl HostDirectory {
    /// Creates a view of the whole directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            include: Vec::new(),
        }
    }

    /// Restricts the view to the given subtrees.
    #[must_use]
    pub fn with_include<I, S>(mut self, include: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = include.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the host root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the include list.
    #[must_use]
    pub fn include(&self) -> &[String] {
        &self.include
    }

    /// Checks that the root and every included subtree exist.
    pub fn check(&self) -> Result<(), HostDirectoryError> {
        if !self.root.is_dir() {
            return Err(HostDirectoryError::MissingRoot(self.root.clone()));
        }
        for entry in self.normalized_include() {
            if !self.root.join(&entry).exists() {
                return Err(HostDirectoryError::MissingInclude {
                    root: self.root.clone(),
                    include: entry,
                });
            }
        }
        Ok(())
    }

    /// Archives the view as an uncompressed tar stream.
    ///
    /// Every entry is placed under `prefix`. Parent directories of each
    /// included subtree get their own entries so extraction recreates them.
    /// Headers are deterministic: host owners and timestamps are not kept.
    pub fn archive(&self, prefix: &str) -> Result<Vec<u8>, HostDirectoryError> {
        self.check()?;
        let include = self.normalized_include();

        let archive_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| HostDirectoryError::Archive { path, source }
        };

        let mut buf = Vec::new();
        {
            let mut builder = tar::Builder::new(&mut buf);
            builder.mode(tar::HeaderMode::Deterministic);
            builder.follow_symlinks(false);

            for parent in parent_entries(&include) {
                let host = self.root.join(&parent);
                builder
                    .append_dir(archive_path(prefix, &parent), &host)
                    .map_err(archive_err(&host))?;
            }

            for entry in &include {
                let host = self.root.join(entry);
                let name = archive_path(prefix, entry);
                debug!(host = %host.display(), archive = %name.display(), "Archiving host path");
                if host.is_dir() {
                    builder.append_dir_all(&name, &host).map_err(archive_err(&host))?;
                } else {
                    builder.append_path_with_name(&host, &name).map_err(archive_err(&host))?;
                }
            }

            builder.finish().map_err(archive_err(&self.root))?;
        }
        Ok(buf)
    }

    /// Include entries without `.` components; `""` stands for the whole root.
    fn normalized_include(&self) -> Vec<String> {
        if self.include.is_empty() {
            return vec![String::new()];
        }
        self.include
            .iter()
            .map(|entry| {
                Path::new(entry)
                    .components()
                    .filter(|c| !matches!(c, Component::CurDir | Component::RootDir))
                    .collect::<PathBuf>()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

fn archive_path(prefix: &str, rel: &str) -> PathBuf {
    match (prefix.is_empty(), rel.is_empty()) {
        (true, true) => PathBuf::from("."),
        (true, false) => PathBuf::from(rel),
        (false, true) => PathBuf::from(prefix),
        (false, false) => Path::new(prefix).join(rel),
    }
}

/// Returns every strict ancestor of the included paths, shortest first,
/// including the root itself as `""`.
fn parent_entries<S: AsRef<str>>(include: &[S]) -> BTreeSet<String> {
    let mut parents = BTreeSet::new();
    for entry in include {
        let entry = entry.as_ref();
        if entry.is_empty() {
            continue;
        }
        parents.insert(String::new());
        let mut acc = PathBuf::new();
        let components: Vec<_> = Path::new(entry).components().collect();
        for component in &components[..components.len().saturating_sub(1)] {
            acc.push(component);
            parents.insert(acc.to_string_lossy().into_owned());
        }
    }
    parents
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("core/tests/cmake")).unwrap();
        fs::write(root.join("core/shape.c"), "int shape;").unwrap();
        fs::write(root.join("core/tests/cmake/CMakeLists.txt"), "project(t)").unwrap();
        fs::create_dir_all(root.join("deps/libz")).unwrap();
        fs::write(root.join("deps/libz/zlib.h"), "#pragma once").unwrap();
        fs::create_dir_all(root.join("deps/other")).unwrap();
        fs::write(root.join("deps/other/skip.h"), "").unwrap();
        fs::write(root.join("README.md"), "skip").unwrap();
        dir
    }

    fn entry_names(archive: &[u8]) -> Vec<String> {
        let mut ar = tar::Archive::new(std::io::Cursor::new(archive));
        ar.entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_archive_contains_only_included_subtrees() {
        let tree = sample_tree();
        let view = HostDirectory::new(tree.path()).with_include(["core", "deps/libz"]);

        let names = entry_names(&view.archive("project").unwrap());

        assert!(names.contains(&"project".to_string()));
        assert!(names.contains(&"project/deps".to_string()));
        assert!(names.contains(&"project/core/shape.c".to_string()));
        assert!(names.contains(&"project/core/tests/cmake/CMakeLists.txt".to_string()));
        assert!(names.contains(&"project/deps/libz/zlib.h".to_string()));
        assert!(!names.iter().any(|n| n.contains("other")));
        assert!(!names.iter().any(|n| n.contains("README")));
    }

    #[test]
    fn test_archive_missing_include() {
        let tree = sample_tree();
        let view = HostDirectory::new(tree.path()).with_include(["core", "deps/zstd"]);

        let err = view.archive("project").unwrap_err();
        assert!(matches!(
            err,
            HostDirectoryError::MissingInclude { ref include, .. } if include == "deps/zstd"
        ));
    }

    #[test]
    fn test_archive_missing_root() {
        let view = HostDirectory::new("/nonexistent/core-ci-root");
        assert!(matches!(
            view.archive("project"),
            Err(HostDirectoryError::MissingRoot(_))
        ));
    }

    #[test]
    fn test_archive_is_stable_for_unchanged_tree() {
        let tree = sample_tree();
        let view = HostDirectory::new(tree.path()).with_include(["core", "deps/libz"]);

        let first = view.archive("project").unwrap();
        let second = view.archive("project").unwrap();
        assert_eq!(entry_names(&first), entry_names(&second));
        assert!(first == second, "archive bytes differ between runs");
    }

    #[test]
    fn test_archive_headers_drop_host_metadata() {
        let tree = sample_tree();
        let view = HostDirectory::new(tree.path()).with_include(["core"]);
        let archive = view.archive("project").unwrap();

        let mut ar = tar::Archive::new(std::io::Cursor::new(archive));
        let headers: Vec<(u64, u64, u64)> = ar
            .entries()
            .unwrap()
            .map(|e| {
                let header = e.unwrap().header().clone();
                (
                    header.mtime().unwrap(),
                    header.uid().unwrap(),
                    header.gid().unwrap(),
                )
            })
            .collect();

        assert!(!headers.is_empty());
        assert!(headers.iter().all(|h| *h == headers[0]));
        assert_eq!((headers[0].1, headers[0].2), (0, 0));
    }

    #[test]
    fn test_current_dir_components_are_dropped() {
        let tree = sample_tree();
        let view = HostDirectory::new(tree.path()).with_include(["./core", "deps/./libz/"]);

        let names = entry_names(&view.archive("project").unwrap());

        assert!(names.contains(&"project/core/shape.c".to_string()));
        assert!(names.contains(&"project/deps/libz/zlib.h".to_string()));
        assert!(!names.iter().any(|n| n.split('/').any(|part| part == ".")));
    }

    #[test]
    fn test_check_reports_missing_include() {
        let tree = sample_tree();
        assert!(HostDirectory::new(tree.path())
            .with_include(["core", "deps/libz"])
            .check()
            .is_ok());

        let err = HostDirectory::new(tree.path())
            .with_include(["core", "deps/zstd"])
            .check()
            .unwrap_err();
        assert!(matches!(err, HostDirectoryError::MissingInclude { .. }));
    }

    #[test]
    fn test_parent_entries() {
        let parents = parent_entries(&["core", "deps/libz"]);
        assert_eq!(
            parents.into_iter().collect::<Vec<_>>(),
            vec![String::new(), "deps".to_string()]
        );
    }
}
