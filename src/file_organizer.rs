/// Filing files into the leaves of a folder hierarchy.
///
/// Rearranging happens in two steps. [`FileRearranger::plan`] scans the flat
/// base directory and decides where every file goes without touching anything;
/// [`FileRearranger::execute`] performs the moves and records them in an
/// [`OperationLog`] so the run can be undone.
///
/// A file belongs in a leaf directory when its name contains a key of every
/// directory on the way down from the root: the directory name for the
/// intermediate levels, and for the leaf its match key (first alias) or its
/// full name. With the outline
///
/// ```text
/// root
///
/// 2020
/// 2021
///
/// teamA tA
/// ```
///
/// both `tA_2021.csv` and `teamA_2021.csv` go to `root/2021/teamA/`. When
/// several leaves match, the first one in hierarchy order wins and the others
/// are reported as alternatives.
use crate::config::{CompiledFilters, LOCAL_CONFIG_FILE, MatchingRules};
use crate::hierarchy::Hierarchy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the run history, stored in the base directory.
pub const HISTORY_FILE: &str = ".dirnest_history.json";

/// Represents a single file move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// The original path of the file before rearranging.
    pub original_path: PathBuf,
    /// The new path of the file after rearranging.
    pub new_path: PathBuf,
    /// The leaf directory, relative to the base path.
    pub destination: PathBuf,
}

/// Everything one run changed, persisted to enable undo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLog {
    /// RFC 3339 timestamp of when the run started.
    pub timestamp: String,
    /// The base directory of the run.
    pub base_path: PathBuf,
    /// Directories created by the run, in creation order.
    #[serde(default)]
    pub created_dirs: Vec<PathBuf>,
    /// All moves performed, in order.
    pub operations: Vec<Operation>,
}

impl OperationLog {
    /// Creates a new operation log for a given base path.
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            base_path,
            created_dirs: Vec::new(),
            operations: Vec::new(),
        }
    }

    /// Adds an operation to this log.
    pub fn add_operation(&mut self, operation: Operation) {
        self.operations.push(operation);
    }

    /// Returns true if the run changed nothing.
    pub fn is_empty(&self) -> bool {
        self.created_dirs.is_empty() && self.operations.is_empty()
    }

    /// Returns the path to the history file for this base path.
    pub fn history_file_path(base_path: &Path) -> PathBuf {
        base_path.join(HISTORY_FILE)
    }

    /// Saves this log to disk in JSON format.
    pub fn save(&self, base_path: &Path) -> OrganizeResult<()> {
        let json_string =
            serde_json::to_string_pretty(self).map_err(|e| OrganizeError::HistoryWriteFailed {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("JSON serialization failed: {}", e),
                ),
            })?;

        fs::write(Self::history_file_path(base_path), json_string)
            .map_err(|e| OrganizeError::HistoryWriteFailed { source: e })?;

        Ok(())
    }

    /// Loads the most recent operation log from disk.
    pub fn load(base_path: &Path) -> OrganizeResult<Option<Self>> {
        let history_path = Self::history_file_path(base_path);

        if !history_path.exists() {
            return Ok(None);
        }

        let json_string = fs::read_to_string(&history_path)
            .map_err(|e| OrganizeError::HistoryReadFailed { source: e })?;

        let log = serde_json::from_str(&json_string).map_err(|e| {
            OrganizeError::InvalidHistoryFormat {
                reason: format!("JSON parse error: {}", e),
            }
        })?;

        Ok(Some(log))
    }

    /// Deletes the history file for a given base path.
    pub fn delete(base_path: &Path) -> OrganizeResult<()> {
        let history_path = Self::history_file_path(base_path);
        if history_path.exists() {
            fs::remove_file(&history_path)
                .map_err(|e| OrganizeError::HistoryWriteFailed { source: e })?;
        }
        Ok(())
    }
}

/// Errors that can occur while rearranging or undoing.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The base directory path is invalid or doesn't exist.
    #[error("Invalid base path {}: {reason}", .path.display())]
    InvalidBasePath { path: PathBuf, reason: String },
    /// The base directory could not be listed.
    #[error("Error reading directory {}: {source}", .path.display())]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to move a file to its leaf directory.
    #[error("Failed to move {} to {}: {source}", .from.display(), .to.display())]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A file already sits at the destination.
    #[error("Refusing to overwrite existing file {}", .path.display())]
    DestinationExists { path: PathBuf },
    /// Failed to write history file.
    #[error("Failed to write history file: {source}")]
    HistoryWriteFailed { source: std::io::Error },
    /// Failed to read history file.
    #[error("Failed to read history file: {source}")]
    HistoryReadFailed { source: std::io::Error },
    /// There is no history file, so there is nothing to undo.
    #[error("No previous run found to undo in {}", .path.display())]
    NoHistory { path: PathBuf },
    /// History file has invalid format.
    #[error("Invalid history file format: {reason}")]
    InvalidHistoryFormat { reason: String },
}

/// Result type for file organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// A move decided by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    /// The file in the base directory.
    pub source: PathBuf,
    /// Where the file will end up.
    pub destination: PathBuf,
    /// The leaf directory, relative to the base path.
    pub leaf: PathBuf,
    /// Other leaves the file name also matched, relative to the base path.
    pub alternatives: Vec<PathBuf>,
}

/// A match that was dropped because the destination already holds a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// The outcome of planning: what moves, what clashes, what stays.
#[derive(Debug, Default, Clone)]
pub struct RearrangePlan {
    pub moves: Vec<PlannedMove>,
    pub conflicts: Vec<Conflict>,
    /// Files that matched no leaf; they stay where they are.
    pub unmatched: Vec<PathBuf>,
}

impl RearrangePlan {
    /// Moves whose file name matched more than one leaf.
    pub fn ambiguous(&self) -> impl Iterator<Item = &PlannedMove> {
        self.moves.iter().filter(|m| !m.alternatives.is_empty())
    }

    /// Number of files scanned.
    pub fn total_files(&self) -> usize {
        self.moves.len() + self.conflicts.len() + self.unmatched.len()
    }
}

/// A leaf directory together with the keys a file name must contain.
///
/// Every entry of `keys` is one level below the root; a file name has to
/// contain at least one of the words of each entry.
#[derive(Debug)]
struct LeafTarget {
    relative: PathBuf,
    keys: Vec<Vec<String>>,
}

impl LeafTarget {
    fn collect(hierarchy: &Hierarchy, case_sensitive: bool) -> Vec<Self> {
        let normalize = |key: &str| {
            if case_sensitive {
                key.to_string()
            } else {
                key.to_lowercase()
            }
        };

        let tree = hierarchy.tree();
        let targets: Vec<Self> = tree
            .leaf_chains()
            .into_iter()
            .filter(|chain| chain.len() > 1)
            .map(|chain| {
                let relative: PathBuf = chain.iter().map(|node| node.spec().name()).collect();
                let below_root = &chain[1..];
                let last = below_root.len() - 1;
                let keys = below_root
                    .iter()
                    .enumerate()
                    .map(|(index, node)| {
                        let spec = node.spec();
                        let mut words = vec![normalize(spec.name())];
                        if index == last && spec.match_key() != spec.name() {
                            words.insert(0, normalize(spec.match_key()));
                        }
                        words
                    })
                    .collect();
                Self { relative, keys }
            })
            .collect();
        targets
    }

    fn matches(&self, file_name: &str) -> bool {
        self.keys
            .iter()
            .all(|words| words.iter().any(|word| file_name.contains(word.as_str())))
    }
}

/// Plans and performs the filing of files into a built hierarchy.
pub struct FileRearranger;

impl FileRearranger {
    /// Scans `base_path` and decides where each file goes.
    ///
    /// Only regular files directly inside `base_path` that pass `filters` are
    /// considered. Files are visited in name order so plans are reproducible.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dirnest::config::Config;
    /// use dirnest::file_organizer::FileRearranger;
    /// use dirnest::hierarchy::Hierarchy;
    /// use std::path::Path;
    ///
    /// let config = Config::default();
    /// let filters = config.compile_filters().unwrap();
    /// let hierarchy: Hierarchy = "root\n\n2020\n\nteamA tA\n".parse().unwrap();
    /// let plan = FileRearranger::plan(Path::new("/path/to/base"), &hierarchy, &filters, &config.matching)
    ///     .unwrap();
    /// for file in &plan.unmatched {
    ///     println!("left in place: {}", file.display());
    /// }
    /// ```
    pub fn plan(
        base_path: &Path,
        hierarchy: &Hierarchy,
        filters: &CompiledFilters,
        matching: &MatchingRules,
    ) -> OrganizeResult<RearrangePlan> {
        if !base_path.is_dir() {
            return Err(OrganizeError::InvalidBasePath {
                path: base_path.to_path_buf(),
                reason: "base path is not an existing directory".to_string(),
            });
        }

        let targets = LeafTarget::collect(hierarchy, matching.case_sensitive);
        let files = Self::scan(base_path, filters)?;
        let mut plan = RearrangePlan::default();

        for file in files {
            let Some(file_name) = file.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            let candidate = if matching.case_sensitive {
                file_name.clone()
            } else {
                file_name.to_lowercase()
            };

            let mut matched = targets.iter().filter(|target| target.matches(&candidate));
            let Some(first) = matched.next() else {
                tracing::trace!(file = %file_name, "no matching leaf");
                plan.unmatched.push(file);
                continue;
            };
            let alternatives: Vec<PathBuf> = matched.map(|t| t.relative.clone()).collect();
            let destination = base_path.join(&first.relative).join(&file_name);

            if destination.exists() {
                tracing::warn!(
                    file = %file_name,
                    destination = %destination.display(),
                    "destination already exists"
                );
                plan.conflicts.push(Conflict {
                    source: file,
                    destination,
                });
                continue;
            }

            if !alternatives.is_empty() {
                tracing::warn!(
                    file = %file_name,
                    chosen = %first.relative.display(),
                    others = alternatives.len(),
                    "file matches several leaves, keeping the first"
                );
            }

            plan.moves.push(PlannedMove {
                source: file,
                destination,
                leaf: first.relative.clone(),
                alternatives,
            });
        }

        tracing::info!(
            moves = plan.moves.len(),
            conflicts = plan.conflicts.len(),
            unmatched = plan.unmatched.len(),
            "planned rearrangement"
        );
        Ok(plan)
    }

    /// Performs the planned moves, recording each one in `log`.
    ///
    /// `on_move` is called after every successful move. The first failure
    /// stops the run; moves made before it stay recorded in `log`.
    pub fn execute<F>(
        plan: &RearrangePlan,
        log: &mut OperationLog,
        mut on_move: F,
    ) -> OrganizeResult<()>
    where
        F: FnMut(&Operation),
    {
        for planned in &plan.moves {
            let operation = Self::move_file(planned)?;
            on_move(&operation);
            log.add_operation(operation);
        }
        Ok(())
    }

    fn move_file(planned: &PlannedMove) -> OrganizeResult<Operation> {
        if planned.destination.exists() {
            return Err(OrganizeError::DestinationExists {
                path: planned.destination.clone(),
            });
        }

        fs::rename(&planned.source, &planned.destination).map_err(|e| {
            OrganizeError::FileMoveFailure {
                from: planned.source.clone(),
                to: planned.destination.clone(),
                source: e,
            }
        })?;
        tracing::debug!(
            from = %planned.source.display(),
            to = %planned.destination.display(),
            "moved file"
        );

        Ok(Operation {
            original_path: planned.source.clone(),
            new_path: planned.destination.clone(),
            destination: planned.leaf.clone(),
        })
    }

    fn scan(base_path: &Path, filters: &CompiledFilters) -> OrganizeResult<Vec<PathBuf>> {
        let entries = fs::read_dir(base_path).map_err(|e| OrganizeError::ScanFailed {
            path: base_path.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter(|entry| {
                let name = entry.file_name();
                name != HISTORY_FILE && name != LOCAL_CONFIG_FILE
            })
            .map(|entry| entry.path())
            .filter(|path| filters.should_include(path))
            .collect();
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::HierarchyBuilder;
    use crate::config::Config;
    use tempfile::TempDir;

    const OUTLINE: &str = "root\n\n2020\n2021\n\nteamA tA\nteamB tB\n";

    fn setup(outline: &str, files: &[&str]) -> (TempDir, Hierarchy) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let hierarchy: Hierarchy = outline.parse().expect("Failed to parse outline");
        HierarchyBuilder::build(temp_dir.path(), &hierarchy).expect("Build failed");
        for name in files {
            fs::write(temp_dir.path().join(name), name).expect("Failed to write test file");
        }
        (temp_dir, hierarchy)
    }

    fn plan(base_path: &Path, hierarchy: &Hierarchy, config: &Config) -> RearrangePlan {
        let filters = config.compile_filters().unwrap();
        FileRearranger::plan(base_path, hierarchy, &filters, &config.matching).expect("Plan failed")
    }

    #[test]
    fn test_plan_matches_alias_or_name() {
        let (temp_dir, hierarchy) =
            setup(OUTLINE, &["tA_2021.csv", "teamA_2020.csv", "teamC_2020.csv"]);
        let base_path = temp_dir.path();

        let plan = plan(base_path, &hierarchy, &Config::default());

        assert_eq!(plan.moves.len(), 2);
        assert_eq!(plan.moves[0].source, base_path.join("tA_2021.csv"));
        assert_eq!(plan.moves[0].leaf, PathBuf::from("root/2021/teamA"));
        assert_eq!(
            plan.moves[0].destination,
            base_path.join("root/2021/teamA/tA_2021.csv")
        );
        assert_eq!(plan.moves[1].source, base_path.join("teamA_2020.csv"));
        assert_eq!(plan.moves[1].leaf, PathBuf::from("root/2020/teamA"));
        assert_eq!(plan.unmatched, vec![base_path.join("teamC_2020.csv")]);
    }

    #[test]
    fn test_intermediate_levels_match_by_name_only() {
        let (temp_dir, hierarchy) = setup("root\n\n2020 y20\n\nteamA tA\n", &["tA_y20.csv"]);
        let plan = plan(temp_dir.path(), &hierarchy, &Config::default());

        assert!(plan.moves.is_empty());
        assert_eq!(plan.unmatched.len(), 1);
    }

    #[test]
    fn test_name_used_when_no_alias() {
        let (temp_dir, hierarchy) = setup("root\n\n2021\n\nteamA\n", &["teamA_2021.csv"]);
        let base_path = temp_dir.path();

        let plan = plan(base_path, &hierarchy, &Config::default());

        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].leaf, PathBuf::from("root/2021/teamA"));
    }

    #[test]
    fn test_first_match_wins() {
        let (temp_dir, hierarchy) = setup(OUTLINE, &["tA_tB_2020.csv"]);
        let base_path = temp_dir.path();

        let plan = plan(base_path, &hierarchy, &Config::default());

        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].leaf, PathBuf::from("root/2020/teamA"));
        assert_eq!(
            plan.moves[0].alternatives,
            vec![PathBuf::from("root/2020/teamB")]
        );
        assert_eq!(plan.ambiguous().count(), 1);
    }

    #[test]
    fn test_existing_destination_is_a_conflict() {
        let (temp_dir, hierarchy) = setup(OUTLINE, &["tA_2020.csv"]);
        let base_path = temp_dir.path();
        fs::write(base_path.join("root/2020/teamA/tA_2020.csv"), "older").unwrap();

        let plan = plan(base_path, &hierarchy, &Config::default());

        assert!(plan.moves.is_empty());
        assert_eq!(plan.conflicts.len(), 1);
        assert_eq!(plan.total_files(), 1);
    }

    #[test]
    fn test_case_insensitive_matching() {
        let (temp_dir, hierarchy) = setup(OUTLINE, &["TA_2020.csv"]);
        let base_path = temp_dir.path();

        let strict = plan(base_path, &hierarchy, &Config::default());
        assert!(strict.moves.is_empty());

        let mut config = Config::default();
        config.matching.case_sensitive = false;
        let relaxed = plan(base_path, &hierarchy, &config);
        assert_eq!(relaxed.moves.len(), 1);
        assert_eq!(relaxed.moves[0].leaf, PathBuf::from("root/2020/teamA"));
    }

    #[test]
    fn test_hidden_files_and_directories_are_skipped() {
        let (temp_dir, hierarchy) = setup(OUTLINE, &[".tA_2020.csv"]);
        let base_path = temp_dir.path();
        fs::create_dir(base_path.join("tA_2020_dir")).unwrap();

        let plan = plan(base_path, &hierarchy, &Config::default());
        assert_eq!(plan.total_files(), 0);
    }

    #[test]
    fn test_root_only_hierarchy_matches_nothing() {
        let (temp_dir, hierarchy) = setup("root\n\n", &["root.csv"]);
        let plan = plan(temp_dir.path(), &hierarchy, &Config::default());

        assert!(plan.moves.is_empty());
        assert_eq!(plan.unmatched.len(), 1);
    }

    #[test]
    fn test_deeper_hierarchy_requires_every_level() {
        let (temp_dir, hierarchy) = setup(
            "root\n\n2020\n\nQ1\nQ2\n\nteamA tA\n",
            &["tA_2020_Q2.csv", "tA_2020.csv"],
        );
        let base_path = temp_dir.path();

        let plan = plan(base_path, &hierarchy, &Config::default());

        assert_eq!(plan.moves.len(), 1);
        assert_eq!(plan.moves[0].leaf, PathBuf::from("root/2020/Q2/teamA"));
        assert_eq!(plan.unmatched, vec![base_path.join("tA_2020.csv")]);
    }

    #[test]
    fn test_execute_moves_and_records() {
        let (temp_dir, hierarchy) = setup(OUTLINE, &["tA_2020.csv", "tB_2021.csv", "notes.txt"]);
        let base_path = temp_dir.path();
        let plan = plan(base_path, &hierarchy, &Config::default());

        let mut log = OperationLog::new(base_path.to_path_buf());
        let mut seen = 0;
        FileRearranger::execute(&plan, &mut log, |_| seen += 1).expect("Execute failed");

        assert_eq!(seen, 2);
        assert_eq!(log.operations.len(), 2);
        assert!(base_path.join("root/2020/teamA/tA_2020.csv").is_file());
        assert!(base_path.join("root/2021/teamB/tB_2021.csv").is_file());
        assert!(!base_path.join("tA_2020.csv").exists());
        assert!(base_path.join("notes.txt").is_file());
    }

    #[test]
    fn test_execute_refuses_to_overwrite() {
        let (temp_dir, hierarchy) = setup(OUTLINE, &["tA_2020.csv"]);
        let base_path = temp_dir.path();
        let plan = plan(base_path, &hierarchy, &Config::default());
        fs::write(base_path.join("root/2020/teamA/tA_2020.csv"), "appeared").unwrap();

        let mut log = OperationLog::new(base_path.to_path_buf());
        let result = FileRearranger::execute(&plan, &mut log, |_| {});

        assert!(matches!(result, Err(OrganizeError::DestinationExists { .. })));
        assert!(log.operations.is_empty());
        assert_eq!(
            fs::read_to_string(base_path.join("root/2020/teamA/tA_2020.csv")).unwrap(),
            "appeared"
        );
    }

    #[test]
    fn test_history_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();

        let mut log = OperationLog::new(base_path.to_path_buf());
        log.created_dirs.push(base_path.join("root"));
        log.add_operation(Operation {
            original_path: base_path.join("a.csv"),
            new_path: base_path.join("root/a.csv"),
            destination: PathBuf::from("root"),
        });
        log.save(base_path).expect("Failed to save history");

        let loaded = OperationLog::load(base_path)
            .expect("Failed to load history")
            .expect("History missing");
        assert_eq!(loaded.operations, log.operations);
        assert_eq!(loaded.created_dirs, log.created_dirs);

        OperationLog::delete(base_path).expect("Failed to delete history");
        assert!(OperationLog::load(base_path).unwrap().is_none());
    }

    #[test]
    fn test_corrupted_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join(HISTORY_FILE), "{ not json").unwrap();

        let result = OperationLog::load(temp_dir.path());
        assert!(matches!(
            result,
            Err(OrganizeError::InvalidHistoryFormat { .. })
        ));
    }

    #[test]
    fn test_plan_invalid_base_path() {
        let hierarchy: Hierarchy = OUTLINE.parse().unwrap();
        let config = Config::default();
        let filters = config.compile_filters().unwrap();

        let result = FileRearranger::plan(
            Path::new("/non/existent/path"),
            &hierarchy,
            &filters,
            &config.matching,
        );
        assert!(result.is_err());
    }
}
