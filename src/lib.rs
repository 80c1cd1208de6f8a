//! dirnest - build a folder hierarchy and file documents into it
//!
//! This library reads a plain-text outline of nested folders, creates the
//! described directory tree, and moves the files of a flat directory into the
//! deepest folder whose names appear in the file name. Runs can be previewed
//! with a dry run and reverted from a recorded history.

pub mod builder;
pub mod cli;
pub mod config;
pub mod file_organizer;
pub mod hierarchy;
pub mod output;
pub mod undo;

pub use builder::{BuildReport, HierarchyBuilder};
pub use config::{CompiledFilters, Config, ConfigError};
pub use file_organizer::{FileRearranger, OperationLog, RearrangePlan};
pub use hierarchy::{DirNode, Hierarchy, HierarchyError, NodeSpec};
pub use undo::{UndoManager, UndoReport};

pub use cli::{Cli, OrganizeCommand, run_cli};
