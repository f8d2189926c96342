//! File corpus loading.
//!
//! Walks a checked-out repository and returns the textual content of every file
//! whose extension is in the requested set, plus a lightweight listing of every
//! entry in the tree so structural heuristics can run without touching disk again.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, trace, warn};
use walkdir::{DirEntry, WalkDir};

use crate::model::FileRecord;

/// Default per-file size cap; larger files are skipped.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Directory names never descended into.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "Pods",
    ".dart_tool",
    ".gradle",
    ".idea",
    "build",
    "dist",
    "target",
    "bin",
    "obj",
    "__pycache__",
    ".venv",
    "venv",
];

/// Any entry in the walked tree (file or directory), relative to the root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Forward-slash separated path relative to the corpus root.
    pub relative_path: String,
    pub is_dir: bool,
    pub size: u64,
}

impl EntryRecord {
    /// Final path component.
    pub fn name(&self) -> &str {
        self.relative_path.rsplit('/').next().unwrap_or(&self.relative_path)
    }

    /// Number of path components (`lib` is 1, `lib/models` is 2).
    pub fn depth(&self) -> usize {
        self.relative_path.split('/').count()
    }
}

/// Loaded files plus the tree listing for one analysis run.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub root: PathBuf,
    pub files: Vec<FileRecord>,
    pub entries: Vec<EntryRecord>,
}

impl Corpus {
    /// Build a corpus from in-memory records (no tree listing).
    pub fn from_files(root: impl Into<PathBuf>, files: Vec<FileRecord>) -> Self {
        Self { root: root.into(), files, entries: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Stable SHA-256 over every file's relative path and content.
    pub fn fingerprint(&self) -> String {
        let mut ordered: Vec<&FileRecord> = self.files.iter().collect();
        ordered.sort_by(|a, b| a.path.cmp(&b.path));
        let mut hasher = Sha256::new();
        for file in ordered {
            let rel = file.path.strip_prefix(&self.root).unwrap_or(&file.path);
            hasher.update(rel.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(file.content.as_bytes());
            hasher.update([0u8]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Options controlling a corpus walk.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub max_file_bytes: u64,
    pub max_depth: usize,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self { max_file_bytes: DEFAULT_MAX_FILE_BYTES, max_depth: 64 }
    }
}

/// Normalize an extension set: lowercase, leading dot stripped, empties dropped.
pub fn normalize_extensions<I, S>(extensions: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    extensions
        .into_iter()
        .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Load every readable file under `root` whose extension is in `extensions`.
///
/// Returns an empty list when nothing matches or the root does not exist.
pub fn load<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Vec<FileRecord> {
    load_corpus_with(root, extensions, &LoadOptions::default()).files
}

/// Load files and the tree listing with default options.
pub fn load_corpus<S: AsRef<str>>(root: &Path, extensions: &[S]) -> Corpus {
    load_corpus_with(root, extensions, &LoadOptions::default())
}

/// Load files and the tree listing.
#[instrument(skip(extensions, options), fields(root = %root.display()))]
pub fn load_corpus_with<S: AsRef<str>>(
    root: &Path,
    extensions: &[S],
    options: &LoadOptions,
) -> Corpus {
    let wanted = normalize_extensions(extensions);
    let mut corpus = Corpus { root: root.to_path_buf(), ..Corpus::default() };

    if !root.is_dir() {
        debug!("Corpus root is not a directory; returning empty corpus");
        return corpus;
    }

    let mut walker =
        WalkDir::new(root).max_depth(options.max_depth).sort_by_file_name().into_iter();

    let mut skipped = 0usize;
    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable tree entry");
                skipped += 1;
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }

        // Ignored directories are listed but never descended into.
        if is_ignored(&entry) {
            corpus.entries.push(EntryRecord {
                relative_path: relative_string(root, entry.path()),
                is_dir: true,
                size: 0,
            });
            walker.skip_current_dir();
            continue;
        }

        let path = entry.path();
        let is_dir = entry.file_type().is_dir();
        let size = if is_dir { 0 } else { entry.metadata().map(|m| m.len()).unwrap_or(0) };
        corpus.entries.push(EntryRecord {
            relative_path: relative_string(root, path),
            is_dir,
            size,
        });

        if !entry.file_type().is_file() {
            continue;
        }
        let extension = extension_of(path);
        if !wanted.contains(&extension) {
            continue;
        }
        if size > options.max_file_bytes {
            debug!(file = %path.display(), size, "Skipping oversized file");
            skipped += 1;
            continue;
        }

        match fs::read_to_string(path) {
            Ok(content) => {
                trace!(file = %path.display(), "Loaded file");
                corpus.files.push(FileRecord {
                    path: path.to_path_buf(),
                    name: entry.file_name().to_string_lossy().to_string(),
                    extension,
                    content,
                });
            }
            Err(err) => {
                warn!(file = %path.display(), error = %err, "Skipping unreadable file");
                skipped += 1;
            }
        }
    }

    debug!(
        files = corpus.files.len(),
        entries = corpus.entries.len(),
        skipped,
        "Corpus load completed"
    );
    corpus
}

/// Whether a directory with this name is skipped by every tree walk.
pub fn is_ignored_name(name: &str) -> bool {
    IGNORED_DIRS.contains(&name)
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.file_type().is_dir() && entry.file_name().to_str().is_some_and(is_ignored_name)
}

fn extension_of(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase()).unwrap_or_default()
}

fn relative_string(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
