//! Rule model, engine, and per-variant rule tables.
//!
//! A rule is a weighted signal over a [`Corpus`](crate::corpus::Corpus). Signals are
//! either text pattern sets, structural heuristics, or boolean combinations of
//! other signals. Rule tables are plain data (YAML) compiled once into
//! [`VariantTable`]s and shared read-only behind `Arc` by every concurrent run.

use std::collections::BTreeSet;
use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;

use crate::model::{Category, FileRecord};

pub mod engine;
pub mod heuristics;
pub mod registry;
pub mod table;

pub use engine::{count_matches, evaluate, Evaluation};
pub use registry::RuleRegistry;
pub use table::{RuleSpec, TableSpec};

/// Error raised while compiling or loading rule tables.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Failed to parse rule table {source_name}: {message}")]
    Parse { source_name: String, message: String },

    #[error("Rule '{rule}' has an invalid pattern '{pattern}': {source}")]
    Pattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Rule '{rule}' is invalid: {message}")]
    InvalidRule { rule: String, message: String },

    #[error("Rule table '{tag}' is invalid: {message}")]
    InvalidTable { tag: String, message: String },

    #[error("Failed to read rule table at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which files a pattern set or heuristic looks at.
///
/// An empty filter accepts every file in the corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileFilter {
    /// Lowercase extensions without the dot.
    pub extensions: BTreeSet<String>,
    /// Lowercase exact file names.
    pub names: BTreeSet<String>,
}

impl FileFilter {
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty() && self.names.is_empty()
    }

    pub fn matches(&self, file: &FileRecord) -> bool {
        if self.is_empty() {
            return true;
        }
        self.extensions.contains(&file.extension)
            || self.names.contains(&file.name.to_ascii_lowercase())
    }
}

/// Compiled include/exclude pattern set.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub include: Vec<Regex>,
    pub exclude: Vec<Regex>,
    pub min_occurrences: usize,
    pub files: FileFilter,
}

impl PatternSet {
    /// Whether a total count meets this set's threshold.
    pub fn is_satisfied(&self, count: usize) -> bool {
        if self.min_occurrences == 0 {
            count > 0
        } else {
            count >= self.min_occurrences
        }
    }
}

/// Whether a structural path check looks for files, directories, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Any,
    Dir,
    File,
}

/// Structural checks that are not plain pattern counts.
#[derive(Debug, Clone)]
pub enum Heuristic {
    /// Fewer than `min_ratio` of all lines start with a comment marker.
    CommentRatio { min_ratio: f64, markers: Vec<String>, files: FileFilter },
    /// Brace-delimited bodies whose header matches `header` and spans more than `max_lines`.
    LongFunctions { max_lines: usize, header: Regex, files: FileFilter },
    /// Windows of `window` lines (longer than `min_chars`) repeat more than `max_ratio`.
    Duplication { window: usize, min_chars: usize, max_ratio: f64, files: FileFilter },
    /// Both space- and tab-indented lines exceed `threshold` of indented lines.
    MixedIndentation { threshold: f64, files: FileFilter },
    /// At least `min_count` distinct entry names under `under` match.
    PathsPresent {
        under: Option<String>,
        names: BTreeSet<String>,
        name_pattern: Option<Regex>,
        entry: EntryKind,
        recursive: bool,
        min_count: usize,
    },
    /// Files under `under` with a listed extension larger than `max_bytes`.
    LargeFiles { under: Option<String>, extensions: BTreeSet<String>, max_bytes: u64 },
    /// Loaded files whose content is longer than `max_chars`.
    FileLength { max_chars: usize, files: FileFilter },
    /// `subject / (subject + counterpart)` match ratio exceeds `max_ratio`.
    PatternRatio { subject: Regex, counterpart: Regex, max_ratio: f64, files: FileFilter },
}

impl Heuristic {
    pub fn name(&self) -> &'static str {
        match self {
            Heuristic::CommentRatio { .. } => "comment_ratio",
            Heuristic::LongFunctions { .. } => "long_functions",
            Heuristic::Duplication { .. } => "duplication",
            Heuristic::MixedIndentation { .. } => "mixed_indentation",
            Heuristic::PathsPresent { .. } => "paths_present",
            Heuristic::LargeFiles { .. } => "large_files",
            Heuristic::FileLength { .. } => "file_length",
            Heuristic::PatternRatio { .. } => "pattern_ratio",
        }
    }
}

/// What a rule measures.
#[derive(Debug, Clone)]
pub enum Signal {
    Patterns(PatternSet),
    AllOf(Vec<Signal>),
    AnyOf(Vec<Signal>),
    Absent(Box<Signal>),
    Heuristic(Heuristic),
}

/// A compiled, immutable rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub category: Category,
    pub message: String,
    pub weight: u32,
    pub signal: Signal,
}

/// All rules for one technology variant.
#[derive(Debug, Clone)]
pub struct VariantTable {
    pub tag: String,
    pub name: String,
    pub aliases: Vec<String>,
    /// Extensions loaded into the corpus for this variant.
    pub extensions: Vec<String>,
    pub rules: Vec<Rule>,
}

impl VariantTable {
    /// Categories with at least one rule.
    pub fn covered_categories(&self) -> BTreeSet<Category> {
        self.rules.iter().map(|r| r.category).collect()
    }
}
