//! Folder hierarchy outlines.
//!
//! A hierarchy is described by a plain-text outline. Each non-blank line is a
//! node spec: the first word is a directory name, any further words are aliases
//! used when matching file names. Blocks of lines are separated by a single
//! blank line, and every block is one level deeper than the previous one. The
//! first block must hold exactly one line, the root directory.
//!
//! ```text
//! season
//!
//! 2020
//! 2021
//!
//! teamA tA
//! teamB tB
//! ```
//!
//! Every node of a level becomes a child of every node of the level above, so
//! the outline above describes `season/2020/teamA`, `season/2020/teamB`,
//! `season/2021/teamA` and `season/2021/teamB`.
//!
//! # Examples
//!
//! ```
//! use dirnest::hierarchy::Hierarchy;
//!
//! let hierarchy: Hierarchy = "season\n\n2020\n2021\n\nteamA tA\n".parse().unwrap();
//! assert_eq!(hierarchy.depth(), 3);
//! assert_eq!(hierarchy.root().name(), "season");
//! assert_eq!(hierarchy.level(3).unwrap()[0].match_key(), "tA");
//! ```
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;

/// Errors raised while reading a hierarchy outline.
#[derive(Debug, Error)]
pub enum HierarchyError {
    /// The outline has no lines at all.
    #[error("The folder hierarchy outline is empty")]
    Empty,
    /// No blank line separates the levels.
    #[error("Please separate levels of folder hierarchy by a blank line")]
    NoLevelSeparator,
    /// The first line is blank, so there is no root directory.
    #[error("Please put the root of the folder hierarchy on the first line")]
    MissingRoot,
    /// The root block holds more than one line.
    #[error("Please ensure that the root of the folder hierarchy is a single directory")]
    MultipleRoots,
    /// Consecutive blank lines left a level without any directory.
    #[error("Level {depth} has no directories (extra blank line before line {line})")]
    EmptyLevel {
        /// The depth left empty.
        depth: usize,
        /// The 1-based line number of the first entry after the gap.
        line: usize,
    },
    /// A directory name is not a single plain path component.
    #[error("Line {line}: '{name}' is not a valid directory name")]
    InvalidName {
        /// The 1-based line number.
        line: usize,
        /// The offending directory name.
        name: String,
    },
    /// The outline file could not be read.
    #[error("Could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A single line of the outline: a directory name plus optional aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    tokens: Vec<String>,
}

impl NodeSpec {
    /// Builds a node spec from whitespace separated words.
    ///
    /// Returns `None` when the line holds no words.
    pub fn from_line(line: &str) -> Option<Self> {
        let tokens: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if tokens.is_empty() {
            None
        } else {
            Some(Self { tokens })
        }
    }

    /// The directory name, always the first word.
    pub fn name(&self) -> &str {
        &self.tokens[0]
    }

    /// Alternate names, in outline order.
    pub fn aliases(&self) -> &[String] {
        &self.tokens[1..]
    }

    /// The token searched for in file names when this node is a leaf.
    ///
    /// The first alias wins over the directory name, so `teamA tA` matches
    /// files containing `tA`.
    pub fn match_key(&self) -> &str {
        self.tokens.get(1).unwrap_or(&self.tokens[0])
    }

    /// All words of the line.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

/// The parsed outline: node specs grouped by depth, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    levels: Vec<Vec<NodeSpec>>,
}

impl Hierarchy {
    /// Reads and parses an outline file.
    pub fn from_file(path: &Path) -> Result<Self, HierarchyError> {
        let content = fs::read_to_string(path).map_err(|source| HierarchyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let hierarchy: Self = content.parse()?;
        tracing::debug!(path = %path.display(), "read folder hierarchy");
        Ok(hierarchy)
    }

    /// Number of levels, root included.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// The node specs at `depth` (1-based), if that level exists.
    pub fn level(&self, depth: usize) -> Option<&[NodeSpec]> {
        depth
            .checked_sub(1)
            .and_then(|index| self.levels.get(index))
            .map(Vec::as_slice)
    }

    /// Iterates over `(depth, specs)` pairs, root first.
    pub fn levels(&self) -> impl Iterator<Item = (usize, &[NodeSpec])> {
        self.levels
            .iter()
            .enumerate()
            .map(|(index, specs)| (index + 1, specs.as_slice()))
    }

    /// The single root node spec.
    pub fn root(&self) -> &NodeSpec {
        &self.levels[0][0]
    }

    /// Expands the levels into an explicit directory tree.
    pub fn tree(&self) -> DirNode {
        DirNode::expand(self.root(), &self.levels[1..])
    }
}

impl FromStr for Hierarchy {
    type Err = HierarchyError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let lines: Vec<&str> = text.lines().collect();

        let is_blank = |line: &&str| line.trim().is_empty();

        if lines.is_empty() {
            return Err(HierarchyError::Empty);
        }
        if !lines.iter().any(is_blank) {
            return Err(HierarchyError::NoLevelSeparator);
        }
        if is_blank(&lines[0]) {
            return Err(HierarchyError::MissingRoot);
        }
        if lines.get(1).is_some_and(|line| !is_blank(line)) {
            return Err(HierarchyError::MultipleRoots);
        }

        let mut levels: Vec<Vec<NodeSpec>> = Vec::new();
        let mut depth = 1;

        for (index, line) in lines.iter().enumerate() {
            let Some(spec) = NodeSpec::from_line(line) else {
                depth += 1;
                continue;
            };
            if !is_plain_name(spec.name()) {
                return Err(HierarchyError::InvalidName {
                    line: index + 1,
                    name: spec.name().to_string(),
                });
            }

            if depth > levels.len() + 1 {
                return Err(HierarchyError::EmptyLevel {
                    depth: levels.len() + 1,
                    line: index + 1,
                });
            }
            if depth > levels.len() {
                levels.push(Vec::new());
            }
            levels[depth - 1].push(spec);
        }

        Ok(Self { levels })
    }
}

/// True when `name` is exactly one normal path component.
fn is_plain_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == OsStr::new(name)
    )
}

/// One directory of the expanded hierarchy.
///
/// Each node owns its children; siblings keep outline order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirNode {
    spec: NodeSpec,
    children: Vec<DirNode>,
}

impl DirNode {
    fn expand(spec: &NodeSpec, below: &[Vec<NodeSpec>]) -> Self {
        let children = match below.split_first() {
            Some((next, rest)) => next.iter().map(|child| Self::expand(child, rest)).collect(),
            None => Vec::new(),
        };
        Self {
            spec: spec.clone(),
            children,
        }
    }

    /// The node spec this directory was created from.
    pub fn spec(&self) -> &NodeSpec {
        &self.spec
    }

    pub fn children(&self) -> &[DirNode] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Relative paths of every directory in the tree.
    ///
    /// Ordered by level first, then by parent, then by outline order
    /// within the level: the order the directories are created in.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut all = Vec::new();
        let mut frontier = vec![(PathBuf::from(self.spec.name()), self)];

        while !frontier.is_empty() {
            let mut next = Vec::new();
            for (path, node) in frontier {
                for child in &node.children {
                    next.push((path.join(child.spec.name()), child));
                }
                all.push(path);
            }
            frontier = next;
        }

        all
    }

    /// Every root-to-leaf chain of nodes, in creation order.
    ///
    /// The first element of each chain is the root itself.
    pub fn leaf_chains(&self) -> Vec<Vec<&DirNode>> {
        let mut chains = vec![vec![self]];
        loop {
            if chains.iter().all(|chain| chain.last().is_some_and(|n| n.is_leaf())) {
                return chains;
            }
            chains = chains
                .into_iter()
                .flat_map(|chain| {
                    let last = chain[chain.len() - 1];
                    last.children
                        .iter()
                        .map(|child| {
                            let mut extended = chain.clone();
                            extended.push(child);
                            extended
                        })
                        .collect::<Vec<_>>()
                })
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTLINE: &str = "root\n\n2020\n2021\n\nteamA tA\nteamB tB\n";

    fn names(specs: &[NodeSpec]) -> Vec<Vec<&str>> {
        specs
            .iter()
            .map(|spec| spec.tokens().iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn test_parse_levels() {
        let hierarchy: Hierarchy = OUTLINE.parse().expect("Failed to parse outline");

        assert_eq!(hierarchy.depth(), 3);
        assert_eq!(names(hierarchy.level(1).unwrap()), vec![vec!["root"]]);
        assert_eq!(
            names(hierarchy.level(2).unwrap()),
            vec![vec!["2020"], vec!["2021"]]
        );
        assert_eq!(
            names(hierarchy.level(3).unwrap()),
            vec![vec!["teamA", "tA"], vec!["teamB", "tB"]]
        );
        assert!(hierarchy.level(0).is_none());
        assert!(hierarchy.level(4).is_none());
    }

    #[test]
    fn test_trailing_blank_lines_add_no_levels() {
        let hierarchy: Hierarchy = "root\n\nA\n\n\n\n".parse().unwrap();
        assert_eq!(hierarchy.depth(), 2);
    }

    #[test]
    fn test_root_only_outline() {
        let hierarchy: Hierarchy = "root\n\n".parse().unwrap();
        assert_eq!(hierarchy.depth(), 1);
        assert!(hierarchy.tree().is_leaf());
    }

    #[test]
    fn test_whitespace_only_line_counts_as_blank() {
        let hierarchy: Hierarchy = "root\n   \nA\n".parse().unwrap();
        assert_eq!(hierarchy.depth(), 2);
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!("".parse::<Hierarchy>(), Err(HierarchyError::Empty)));
    }

    #[test]
    fn test_no_blank_line_is_rejected() {
        assert!(matches!(
            "root\nA\nB".parse::<Hierarchy>(),
            Err(HierarchyError::NoLevelSeparator)
        ));
        assert!(matches!(
            "root".parse::<Hierarchy>(),
            Err(HierarchyError::NoLevelSeparator)
        ));
    }

    #[test]
    fn test_missing_root() {
        assert!(matches!(
            "\nroot\n\nA".parse::<Hierarchy>(),
            Err(HierarchyError::MissingRoot)
        ));
    }

    #[test]
    fn test_multiple_roots() {
        assert!(matches!(
            "root\nother\n\nA".parse::<Hierarchy>(),
            Err(HierarchyError::MultipleRoots)
        ));
    }

    #[test]
    fn test_names_must_stay_inside_parent() {
        for (outline, bad_line, bad_name) in [
            ("/abs\n\nA\n", 1, "/abs"),
            ("root\n\n..\n", 3, ".."),
            ("root\n\nA\n\n.\n", 5, "."),
            ("root\n\nA\nx/y\n", 4, "x/y"),
            ("root\n\nA/\n", 3, "A/"),
        ] {
            match outline.parse::<Hierarchy>() {
                Err(HierarchyError::InvalidName { line, name }) => {
                    assert_eq!(line, bad_line, "outline {:?}", outline);
                    assert_eq!(name, bad_name);
                }
                other => panic!("expected InvalidName for {:?}, got {:?}", outline, other),
            }
        }
    }

    #[test]
    fn test_aliases_are_not_path_checked() {
        let hierarchy: Hierarchy = "root\n\nteamA t/A\n".parse().unwrap();
        assert_eq!(hierarchy.level(2).unwrap()[0].match_key(), "t/A");
    }

    #[test]
    fn test_double_blank_line_leaves_empty_level() {
        let result = "root\n\nA\n\n\nB\n".parse::<Hierarchy>();
        match result {
            Err(HierarchyError::EmptyLevel { depth, line }) => {
                assert_eq!(depth, 3);
                assert_eq!(line, 6);
            }
            other => panic!("Expected EmptyLevel, got {:?}", other),
        }
    }

    #[test]
    fn test_match_key_prefers_alias() {
        let spec = NodeSpec::from_line("teamA tA extra").unwrap();
        assert_eq!(spec.name(), "teamA");
        assert_eq!(spec.match_key(), "tA");
        assert_eq!(spec.aliases(), &["tA".to_string(), "extra".to_string()]);

        let plain = NodeSpec::from_line("  teamB  ").unwrap();
        assert_eq!(plain.match_key(), "teamB");
        assert!(plain.aliases().is_empty());

        assert!(NodeSpec::from_line("   ").is_none());
    }

    #[test]
    fn test_tree_is_full_cross_product() {
        let hierarchy: Hierarchy = OUTLINE.parse().unwrap();
        let tree = hierarchy.tree();

        assert_eq!(tree.spec().name(), "root");
        assert_eq!(tree.children().len(), 2);
        for year in tree.children() {
            let teams: Vec<&str> = year.children().iter().map(|c| c.spec().name()).collect();
            assert_eq!(teams, vec!["teamA", "teamB"]);
            assert!(year.children().iter().all(DirNode::is_leaf));
        }
    }

    #[test]
    fn test_paths_in_creation_order() {
        let hierarchy: Hierarchy = OUTLINE.parse().unwrap();
        let paths = hierarchy.tree().paths();

        let expected: Vec<PathBuf> = [
            "root",
            "root/2020",
            "root/2021",
            "root/2020/teamA",
            "root/2020/teamB",
            "root/2021/teamA",
            "root/2021/teamB",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(paths, expected);
    }

    #[test]
    fn test_two_levels_do_not_nest_siblings() {
        let hierarchy: Hierarchy = "R\n\nA\nB\n".parse().unwrap();
        let paths = hierarchy.tree().paths();

        assert_eq!(
            paths,
            vec![
                PathBuf::from("R"),
                PathBuf::from("R/A"),
                PathBuf::from("R/B")
            ]
        );
        assert!(!paths.contains(&PathBuf::from("R/A/A")));
    }

    #[test]
    fn test_leaf_chains() {
        let hierarchy: Hierarchy = OUTLINE.parse().unwrap();
        let tree = hierarchy.tree();
        let chains: Vec<Vec<&str>> = tree
            .leaf_chains()
            .iter()
            .map(|chain| chain.iter().map(|n| n.spec().name()).collect())
            .collect();

        assert_eq!(
            chains,
            vec![
                vec!["root", "2020", "teamA"],
                vec!["root", "2020", "teamB"],
                vec!["root", "2021", "teamA"],
                vec!["root", "2021", "teamB"],
            ]
        );
    }

    #[test]
    fn test_from_file_missing() {
        let result = Hierarchy::from_file(Path::new("/non/existent/outline.txt"));
        assert!(matches!(result, Err(HierarchyError::Read { .. })));
    }
}
