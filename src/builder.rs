/// Materializes a folder hierarchy on disk.
///
/// Directories are created under an explicit base path in the order produced by
/// [`DirNode::paths`](crate::hierarchy::DirNode::paths). Directories that already
/// exist are left alone, so building twice is harmless.
use crate::hierarchy::Hierarchy;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The base directory is missing or not a directory.
    #[error("Invalid base path {}: {reason}", .path.display())]
    InvalidBasePath { path: PathBuf, reason: String },
    /// A directory could not be created.
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A non-directory already sits where a directory should go.
    #[error("Cannot create directory {}: a file with that name already exists", .path.display())]
    PathOccupied { path: PathBuf },
}

/// What a build did, in creation order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Directories created by this build.
    pub created: Vec<PathBuf>,
    /// Directories that were already present.
    pub existing: Vec<PathBuf>,
}

impl BuildReport {
    /// Total number of directories in the hierarchy.
    pub fn total(&self) -> usize {
        self.created.len() + self.existing.len()
    }
}

/// Creates the directory tree described by a [`Hierarchy`].
pub struct HierarchyBuilder;

impl HierarchyBuilder {
    /// Creates every directory of the hierarchy below `base_path`.
    ///
    /// # Errors
    ///
    /// Fails on the first directory that cannot be created; directories created
    /// before the failure are kept.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirnest::builder::HierarchyBuilder;
    /// use dirnest::hierarchy::Hierarchy;
    /// use std::path::Path;
    ///
    /// let hierarchy: Hierarchy = "season\n\n2020\n2021\n".parse().unwrap();
    /// let report = HierarchyBuilder::build(Path::new("/path/to/base"), &hierarchy).unwrap();
    /// println!("Created {} directories", report.created.len());
    /// ```
    pub fn build(base_path: &Path, hierarchy: &Hierarchy) -> Result<BuildReport, BuildError> {
        let mut report = BuildReport::default();
        Self::build_into(base_path, hierarchy, &mut report)?;
        Ok(report)
    }

    /// Like [`build`](Self::build), but records into a caller-owned report.
    ///
    /// On error `report` still lists every directory created before the
    /// failure.
    pub fn build_into(
        base_path: &Path,
        hierarchy: &Hierarchy,
        report: &mut BuildReport,
    ) -> Result<(), BuildError> {
        Self::check_base(base_path)?;

        for relative in hierarchy.tree().paths() {
            let path = base_path.join(&relative);

            if path.is_dir() {
                tracing::trace!(path = %path.display(), "directory already exists");
                report.existing.push(path);
                continue;
            }
            if path.exists() {
                return Err(BuildError::PathOccupied { path });
            }

            fs::create_dir(&path).map_err(|source| BuildError::DirectoryCreationFailed {
                path: path.clone(),
                source,
            })?;
            tracing::debug!(path = %path.display(), "created directory");
            report.created.push(path);
        }

        tracing::info!(
            created = report.created.len(),
            existing = report.existing.len(),
            "built folder hierarchy"
        );
        Ok(())
    }

    /// Lists the directories [`build`](Self::build) would create, without
    /// touching the filesystem.
    pub fn plan(base_path: &Path, hierarchy: &Hierarchy) -> Result<Vec<PathBuf>, BuildError> {
        Self::check_base(base_path)?;

        Ok(hierarchy
            .tree()
            .paths()
            .into_iter()
            .map(|relative| base_path.join(relative))
            .filter(|path| !path.is_dir())
            .collect())
    }

    fn check_base(base_path: &Path) -> Result<(), BuildError> {
        if !base_path.exists() {
            return Err(BuildError::InvalidBasePath {
                path: base_path.to_path_buf(),
                reason: "base path does not exist".to_string(),
            });
        }
        if !base_path.is_dir() {
            return Err(BuildError::InvalidBasePath {
                path: base_path.to_path_buf(),
                reason: "base path is not a directory".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn hierarchy(text: &str) -> Hierarchy {
        text.parse().expect("Failed to parse outline")
    }

    #[test]
    fn test_build_creates_cross_product() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();

        let report = HierarchyBuilder::build(base_path, &hierarchy("R\n\nA\nB\n\nx\ny\n"))
            .expect("Build failed");

        assert_eq!(report.created.len(), 7);
        assert!(report.existing.is_empty());
        for dir in ["R", "R/A", "R/B", "R/A/x", "R/A/y", "R/B/x", "R/B/y"] {
            assert!(base_path.join(dir).is_dir(), "missing {}", dir);
        }
        assert!(!base_path.join("R/A/A").exists());
    }

    #[test]
    fn test_build_is_idempotent() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let outline = hierarchy("R\n\nA\nB\n");

        HierarchyBuilder::build(base_path, &outline).expect("First build failed");
        let second = HierarchyBuilder::build(base_path, &outline).expect("Second build failed");

        assert!(second.created.is_empty());
        assert_eq!(second.existing.len(), 3);
        assert_eq!(second.total(), 3);
    }

    #[test]
    fn test_build_keeps_existing_contents() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir_all(base_path.join("R/A")).unwrap();
        fs::write(base_path.join("R/A/keep.txt"), "keep").unwrap();

        let report =
            HierarchyBuilder::build(base_path, &hierarchy("R\n\nA\nB\n")).expect("Build failed");

        assert_eq!(report.created, vec![base_path.join("R").join("B")]);
        assert_eq!(
            fs::read_to_string(base_path.join("R/A/keep.txt")).unwrap(),
            "keep"
        );
    }

    #[test]
    fn test_build_fails_when_file_occupies_path() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("R")).unwrap();
        fs::write(base_path.join("R/A"), "not a directory").unwrap();

        let result = HierarchyBuilder::build(base_path, &hierarchy("R\n\nA\n"));
        assert!(matches!(result, Err(BuildError::PathOccupied { .. })));
    }

    #[test]
    fn test_failed_build_reports_partial_progress() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("R")).unwrap();
        fs::write(base_path.join("R/B"), "not a directory").unwrap();

        let mut report = BuildReport::default();
        let outline = hierarchy("R\n\nA\nB\nC\n");
        let result = HierarchyBuilder::build_into(base_path, &outline, &mut report);

        assert!(matches!(result, Err(BuildError::PathOccupied { .. })));
        assert_eq!(report.created, vec![base_path.join("R").join("A")]);
        assert_eq!(report.existing, vec![base_path.join("R")]);
        assert!(!base_path.join("R/C").exists());
    }

    #[test]
    fn test_plan_does_not_touch_disk() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("R")).unwrap();

        let planned = HierarchyBuilder::plan(base_path, &hierarchy("R\n\nA\nB\n")).unwrap();

        assert_eq!(
            planned,
            vec![base_path.join("R").join("A"), base_path.join("R").join("B")]
        );
        assert!(!base_path.join("R/A").exists());
    }

    #[test]
    fn test_build_invalid_base_path() {
        let result = HierarchyBuilder::build(Path::new("/non/existent/path"), &hierarchy("R\n\nA\n"));
        assert!(matches!(result, Err(BuildError::InvalidBasePath { .. })));
    }
}
