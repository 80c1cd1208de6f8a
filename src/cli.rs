//! Command-line interface module for dirnest.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing and validation
//! - Logging setup
//! - Build and rearrange orchestration
//! - Dry-run reporting
//! - Undo operation handling

use crate::builder::{BuildError, BuildReport, HierarchyBuilder};
use crate::config::{CompiledFilters, Config, ConfigError, MatchingRules};
use crate::file_organizer::{FileRearranger, OperationLog, OrganizeError, RearrangePlan};
use crate::hierarchy::{Hierarchy, HierarchyError};
use crate::output::OutputFormatter;
use crate::undo::UndoManager;
use clap::ArgAction;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Build a folder hierarchy from a text outline and file existing files into it.
#[derive(Debug, clap::Parser)]
#[command(name = "dirnest", version, about)]
pub struct Cli {
    /// Text file describing the folder hierarchy (must end in .txt)
    pub hierarchy_file: PathBuf,

    /// Directory holding the files to rearrange, relative to the home directory
    pub target_dir: PathBuf,

    /// Show what would be created and moved without changing anything
    #[arg(long, conflicts_with = "undo")]
    pub dry_run: bool,

    /// Revert the previous run in the target directory
    #[arg(long)]
    pub undo: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the target is resolved against (defaults to $HOME)
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Problems with the shape of the command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Wrong number of arguments.
    #[error(
        "Please specify command in the following format: dirnest <hierarchy-file>.txt <target-directory>"
    )]
    Usage,
    /// The hierarchy outline is not a `.txt` file.
    #[error("Input file not in .txt format.")]
    NotTxt,
    /// The target directory looks like the outline; arguments are probably swapped.
    #[error("Input file must be the first argument.")]
    Swapped,
}

/// Errors surfaced to the user by a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Arguments(#[from] ArgumentError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error("Error loading configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Organize(#[from] OrganizeError),
    /// Neither `--home` nor `$HOME` is available.
    #[error("Could not determine the home directory; pass --home <DIR>")]
    HomeNotFound,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeCommand {
    /// Build the hierarchy and rearrange files.
    Organize {
        /// If true, simulate the operation without making changes.
        dry_run: bool,
    },
    /// Undo the previous run.
    Undo,
}

impl Cli {
    /// Sets up logging, validates the arguments and runs the selected command.
    pub fn run(self) -> Result<(), CliError> {
        Self::setup_logging(self.verbose);

        validate_arguments(&self.hierarchy_file, &self.target_dir)?;
        let base_path = self.resolve_target()?;
        tracing::debug!(base = %base_path.display(), "resolved target directory");

        run_cli(
            self.command(),
            &self.hierarchy_file,
            &base_path,
            self.config.as_deref(),
        )
    }

    /// The command selected by the flags.
    pub fn command(&self) -> OrganizeCommand {
        if self.undo {
            OrganizeCommand::Undo
        } else {
            OrganizeCommand::Organize {
                dry_run: self.dry_run,
            }
        }
    }

    /// Resolves the target directory against `--home` or `$HOME`.
    ///
    /// An absolute target is returned unchanged.
    pub fn resolve_target(&self) -> Result<PathBuf, CliError> {
        let home = match &self.home {
            Some(home) => home.clone(),
            None => std::env::var_os("HOME")
                .map(PathBuf::from)
                .ok_or(CliError::HomeNotFound)?,
        };
        Ok(home.join(&self.target_dir))
    }

    fn setup_logging(verbosity: u8) {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let level = match verbosity {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };

        let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_names(false)
            .with_line_number(false)
            .with_writer(std::io::stderr);

        // A subscriber may already be installed when embedded in tests.
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init();
    }
}

/// Checks the positional arguments before anything is read.
///
/// The outline must end in `.txt`, and the target must not, which catches
/// swapped arguments.
pub fn validate_arguments(hierarchy_file: &Path, target_dir: &Path) -> Result<(), ArgumentError> {
    if !hierarchy_file.to_string_lossy().ends_with(".txt") {
        return Err(ArgumentError::NotTxt);
    }
    if target_dir.to_string_lossy().ends_with(".txt") {
        return Err(ArgumentError::Swapped);
    }
    Ok(())
}

/// Runs a command against an already resolved base directory.
///
/// This is the main entry point for library users and tests.
///
/// # Examples
///
/// ```no_run
/// use dirnest::cli::{run_cli, OrganizeCommand};
/// use std::path::Path;
///
/// let result = run_cli(
///     OrganizeCommand::Organize { dry_run: false },
///     Path::new("teams.txt"),
///     Path::new("/home/user/stats"),
///     None,
/// );
/// if let Err(e) = result {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(
    command: OrganizeCommand,
    hierarchy_file: &Path,
    base_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    match command {
        OrganizeCommand::Organize { dry_run: true } => {
            organize_dry_run(hierarchy_file, base_path, config_path)
        }
        OrganizeCommand::Organize { dry_run: false } => {
            organize(hierarchy_file, base_path, config_path)
        }
        OrganizeCommand::Undo => undo_organization(base_path),
    }
}

/// Builds the hierarchy in `base_path` and files the matching files into it.
///
/// This function:
/// 1. Reads and validates the outline (nothing is created if it is malformed)
/// 2. Loads filter configuration (if available)
/// 3. Creates the folder hierarchy
/// 4. Plans where each file goes
/// 5. Moves the files, recording every change for undo
pub fn organize(
    hierarchy_file: &Path,
    base_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    let hierarchy = Hierarchy::from_file(hierarchy_file)?;
    let config = Config::load(config_path, base_path)?;
    let filters = config.compile_filters()?;

    OutputFormatter::info(&format!("Organizing contents of: {}", base_path.display()));

    let mut build = BuildReport::default();
    let built = HierarchyBuilder::build_into(base_path, &hierarchy, &mut build);
    if built.is_ok() {
        OutputFormatter::success(&format!(
            "Folder hierarchy ready: {} created, {} already present",
            build.created.len(),
            build.existing.len()
        ));
    }

    // Recorded even when the build stopped partway.
    let mut log = OperationLog::new(base_path.to_path_buf());
    log.created_dirs = build.created;

    let result = built
        .map_err(CliError::from)
        .and_then(|()| rearrange(base_path, &hierarchy, &filters, &config.matching, &mut log));

    if !log.is_empty() {
        match log.save(base_path) {
            Ok(()) => OutputFormatter::plain(&format!(
                "History saved. Use 'dirnest {} {} --undo' to revert changes.",
                hierarchy_file.display(),
                base_path.display()
            )),
            Err(e) => OutputFormatter::warning(&format!("Could not save history: {}", e)),
        }
    }

    let plan = result?;

    report_plan_notes(&plan);
    OutputFormatter::summary_table(&destination_counts(&plan), plan.moves.len());
    OutputFormatter::success("Organization complete!");
    Ok(())
}

/// Plans and performs the moves, showing a progress bar.
fn rearrange(
    base_path: &Path,
    hierarchy: &Hierarchy,
    filters: &CompiledFilters,
    matching: &MatchingRules,
    log: &mut OperationLog,
) -> Result<RearrangePlan, CliError> {
    let plan = FileRearranger::plan(base_path, hierarchy, filters, matching)?;

    let pb = OutputFormatter::create_progress_bar(plan.moves.len() as u64);
    let result = FileRearranger::execute(&plan, log, |operation| {
        pb.set_message(operation.destination.display().to_string());
        pb.inc(1);
    });
    pb.finish_and_clear();

    result?;
    Ok(plan)
}

/// Shows what [`organize`] would do without creating or moving anything.
pub fn organize_dry_run(
    hierarchy_file: &Path,
    base_path: &Path,
    config_path: Option<&Path>,
) -> Result<(), CliError> {
    let hierarchy = Hierarchy::from_file(hierarchy_file)?;
    let config = Config::load(config_path, base_path)?;
    let filters = config.compile_filters()?;

    OutputFormatter::dry_run_notice(&format!(
        "Analyzing contents of: {}",
        base_path.display()
    ));

    let new_dirs = HierarchyBuilder::plan(base_path, &hierarchy)?;
    if new_dirs.is_empty() {
        OutputFormatter::plain("All directories already exist.");
    } else {
        OutputFormatter::header("Directories that would be created:");
        for dir in &new_dirs {
            OutputFormatter::plain(&format!(" + {}", dir.display()));
        }
    }

    let plan = FileRearranger::plan(base_path, &hierarchy, &filters, &config.matching)?;
    if plan.moves.is_empty() {
        OutputFormatter::plain("No files would be moved.");
    } else {
        OutputFormatter::header("Files would be moved as follows:");
        for planned in &plan.moves {
            let name = planned
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            OutputFormatter::plain(&format!(" - {}", name));
            OutputFormatter::plain(&format!("   → Would move to {}/", planned.leaf.display()));
        }
    }

    report_plan_notes(&plan);
    OutputFormatter::summary_table(&destination_counts(&plan), plan.moves.len());
    OutputFormatter::dry_run_notice("Dry run complete. No files were modified.");
    Ok(())
}

/// Undoes the previous run in `base_path`.
fn undo_organization(base_path: &Path) -> Result<(), CliError> {
    OutputFormatter::info("Undoing previous organization...");

    let report = UndoManager::undo(base_path)?;
    OutputFormatter::success("Undo complete!");
    OutputFormatter::plain(&format!("  Restored: {}", report.restored_files));
    OutputFormatter::plain(&format!(
        "  Removed directories: {}",
        report.removed_dirs.len()
    ));

    if !report.kept_dirs.is_empty() {
        OutputFormatter::warning(&format!(
            "{} directories were not empty and were kept",
            report.kept_dirs.len()
        ));
    }

    if !report.skipped_files.is_empty() {
        OutputFormatter::plain(&format!("  Skipped: {}", report.skipped_files.len()));
        for (path, reason) in &report.skipped_files {
            OutputFormatter::plain(&format!("    - {}: {}", path.display(), reason));
        }
    }

    if !report.failed_restores.is_empty() {
        OutputFormatter::plain(&format!("  Failed: {}", report.failed_restores.len()));
        for (path, reason) in &report.failed_restores {
            OutputFormatter::error(&format!("    - {}: {}", path.display(), reason));
        }
        OutputFormatter::warning("History file was NOT deleted due to failures.");
    }

    Ok(())
}

/// Prints the ambiguous matches, conflicts and unmatched files of a plan.
fn report_plan_notes(plan: &RearrangePlan) {
    for planned in plan.ambiguous() {
        let others: Vec<String> = planned
            .alternatives
            .iter()
            .map(|alt| alt.display().to_string())
            .collect();
        OutputFormatter::warning(&format!(
            "{} also matches {}; filed under {}",
            planned.source.display(),
            others.join(", "),
            planned.leaf.display()
        ));
    }

    for conflict in &plan.conflicts {
        OutputFormatter::warning(&format!(
            "Skipped {}: {} already exists",
            conflict.source.display(),
            conflict.destination.display()
        ));
    }

    if !plan.unmatched.is_empty() {
        OutputFormatter::info(&format!(
            "{} of {} files matched no directory and stay in place",
            plan.unmatched.len(),
            plan.total_files()
        ));
    }
}

fn destination_counts(plan: &RearrangePlan) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for planned in &plan.moves {
        *counts.entry(planned.leaf.display().to_string()).or_insert(0) += 1;
    }
    counts
}
