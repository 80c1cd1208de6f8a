/// Undo functionality for reverting a rearranging run.
///
/// Files are moved back to the flat base directory based on the recorded
/// history, then the directories the run created are removed if they are
/// empty again.
use crate::file_organizer::{Operation, OperationLog, OrganizeError, OrganizeResult};
use std::fs;
use std::path::{Path, PathBuf};

/// Represents the result of an undo operation.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files that failed to restore, with the reason.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files that were skipped (e.g., file not found).
    pub skipped_files: Vec<(PathBuf, String)>,
    /// Directories removed because the run created them and they are empty.
    pub removed_dirs: Vec<PathBuf>,
    /// Created directories left in place because they still hold entries.
    pub kept_dirs: Vec<PathBuf>,
}

impl UndoReport {
    /// Returns the total number of file operations processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every file was restored.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

/// Manages undo operations for rearranging runs.
pub struct UndoManager;

impl UndoManager {
    /// Undoes the most recent run in `base_path`.
    ///
    /// # Edge Cases Handled
    ///
    /// * **File not found**: Skipped with a note that the file couldn't be found
    /// * **File name conflict**: The conflicting file is backed up with a timestamp suffix
    /// * **Permission denied**: Recorded as a failure with the error reason
    /// * **Non-empty created directory**: Kept, and listed in the report
    /// * **Missing history**: Returns [`OrganizeError::NoHistory`]
    ///
    /// The history file is deleted only when every file was restored.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirnest::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// match UndoManager::undo(Path::new("/path/to/directory")) {
    ///     Ok(report) => println!("Restored {} files", report.restored_files),
    ///     Err(e) => eprintln!("Undo failed: {}", e),
    /// }
    /// ```
    pub fn undo(base_path: &Path) -> OrganizeResult<UndoReport> {
        if !base_path.exists() {
            return Err(OrganizeError::InvalidBasePath {
                path: base_path.to_path_buf(),
                reason: "base path does not exist".to_string(),
            });
        }

        let log = OperationLog::load(base_path)?.ok_or_else(|| OrganizeError::NoHistory {
            path: base_path.to_path_buf(),
        })?;

        let mut report = UndoReport::default();
        for operation in log.operations.iter().rev() {
            match Self::restore_file(operation) {
                Ok(()) => report.restored_files += 1,
                Err((path, reason)) => {
                    if reason.contains("not found") {
                        report.skipped_files.push((path, reason));
                    } else {
                        report.failed_restores.push((path, reason));
                    }
                }
            }
        }

        for dir in log.created_dirs.iter().rev() {
            match fs::remove_dir(dir) {
                Ok(()) => {
                    tracing::debug!(path = %dir.display(), "removed directory");
                    report.removed_dirs.push(dir.clone());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::debug!(path = %dir.display(), error = %e, "kept directory");
                    report.kept_dirs.push(dir.clone());
                }
            }
        }

        if report.is_complete_success()
            && let Err(e) = OperationLog::delete(base_path)
        {
            tracing::warn!(error = %e, "could not delete history file");
        }

        tracing::info!(
            restored = report.restored_files,
            removed_dirs = report.removed_dirs.len(),
            "undo finished"
        );
        Ok(report)
    }

    /// Restores a single file to its original location.
    ///
    /// Handles file name conflicts by backing up the existing file with a timestamp.
    fn restore_file(operation: &Operation) -> Result<(), (PathBuf, String)> {
        if !operation.new_path.exists() {
            return Err((
                operation.new_path.clone(),
                "File not found at expected location".to_string(),
            ));
        }

        if operation.original_path.exists() {
            let backup_path = Self::generate_backup_path(&operation.original_path);
            fs::rename(&operation.original_path, &backup_path).map_err(|e| {
                (
                    operation.original_path.clone(),
                    format!("Could not backup conflicting file: {}", e),
                )
            })?;
        }

        fs::rename(&operation.new_path, &operation.original_path).map_err(|e| {
            (
                operation.new_path.clone(),
                format!("Failed to restore file: {}", e),
            )
        })?;

        Ok(())
    }

    /// Generates a backup path for a file by appending a timestamp.
    ///
    /// Example: `file.csv` becomes `file.csv.bak.20251109-143052`
    fn generate_backup_path(original_path: &Path) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let filename = original_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file");

        let backup_name = format!("{}.bak.{}", filename, timestamp);

        match original_path.parent() {
            Some(parent) => parent.join(backup_name),
            None => PathBuf::from(backup_name),
        }
    }
}
