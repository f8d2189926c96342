//! Structural heuristics: comment density, long bodies, duplicated segments,
//! indentation mix, path presence, and asset sizes.
//!
//! Each returns an [`Evaluation`] whose count is the number of offending items.

use std::collections::{BTreeSet, HashSet};

use crate::corpus::{Corpus, EntryRecord};
use crate::model::FileRecord;
use crate::rules::engine::Evaluation;
use crate::rules::{EntryKind, FileFilter, Heuristic};

pub fn evaluate(corpus: &Corpus, heuristic: &Heuristic) -> Evaluation {
    match heuristic {
        Heuristic::CommentRatio { min_ratio, markers, files } => {
            comment_ratio(filtered(corpus, files), *min_ratio, markers)
        }
        Heuristic::LongFunctions { max_lines, header, files } => {
            long_functions(filtered(corpus, files), header, *max_lines)
        }
        Heuristic::Duplication { window, min_chars, max_ratio, files } => {
            duplication(filtered(corpus, files), *window, *min_chars, *max_ratio)
        }
        Heuristic::MixedIndentation { threshold, files } => {
            mixed_indentation(filtered(corpus, files), *threshold)
        }
        Heuristic::PathsPresent { under, names, name_pattern, entry, recursive, min_count } => {
            let matched: BTreeSet<String> =
                entries_under(&corpus.entries, under.as_deref(), *recursive)
                    .filter(|e| kind_matches(*entry, e))
                    .filter(|e| {
                        let name = e.name().to_ascii_lowercase();
                        names.contains(&name)
                            || name_pattern.as_ref().map(|re| re.is_match(e.name())).unwrap_or(false)
                    })
                    .map(|e| e.name().to_ascii_lowercase())
                    .collect();
            let count = matched.len();
            Evaluation::new(count, count >= (*min_count).max(1))
        }
        Heuristic::LargeFiles { under, extensions, max_bytes } => {
            let count = entries_under(&corpus.entries, under.as_deref(), true)
                .filter(|e| !e.is_dir && e.size > *max_bytes)
                .filter(|e| extensions.is_empty() || extensions.contains(&entry_extension(e)))
                .count();
            Evaluation::new(count, count > 0)
        }
        Heuristic::FileLength { max_chars, files } => {
            let count =
                filtered(corpus, files).filter(|f| f.content.chars().count() > *max_chars).count();
            Evaluation::new(count, count > 0)
        }
        Heuristic::PatternRatio { subject, counterpart, max_ratio, files } => {
            let (mut ours, mut theirs) = (0usize, 0usize);
            for file in filtered(corpus, files) {
                ours += subject.find_iter(&file.content).count();
                theirs += counterpart.find_iter(&file.content).count();
            }
            let triggered = ours > 0 && (ours as f64 / (ours + theirs) as f64) > *max_ratio;
            Evaluation::new(ours, triggered)
        }
    }
}

fn filtered<'a>(
    corpus: &'a Corpus,
    filter: &'a FileFilter,
) -> impl Iterator<Item = &'a FileRecord> {
    corpus.files.iter().filter(move |f| filter.matches(f))
}

/// Triggered when the share of comment lines is below `min_ratio`.
/// Never triggers when there are no lines at all.
pub fn comment_ratio<'a>(
    files: impl Iterator<Item = &'a FileRecord>,
    min_ratio: f64,
    markers: &[String],
) -> Evaluation {
    let mut total = 0usize;
    let mut comments = 0usize;
    for file in files {
        for line in file.content.split('\n') {
            total += 1;
            let trimmed = line.trim();
            if markers.iter().any(|m| trimmed.starts_with(m.as_str())) {
                comments += 1;
            }
        }
    }
    if total == 0 {
        return Evaluation::new(0, false);
    }
    let triggered = (comments as f64 / total as f64) < min_ratio;
    Evaluation::new(usize::from(triggered), triggered)
}

/// Count brace-delimited bodies, starting at a `header` match, longer than `max_lines`.
pub fn long_functions<'a>(
    files: impl Iterator<Item = &'a FileRecord>,
    header: &regex::Regex,
    max_lines: usize,
) -> Evaluation {
    let mut count = 0usize;
    for file in files {
        let content = file.content.as_str();
        for m in header.find_iter(content) {
            let Some(open) = content[m.start()..m.end()].rfind('{') else {
                continue;
            };
            let body_start = m.start() + open + 1;
            let end = matching_brace(content, body_start).unwrap_or(content.len());
            let lines = content[m.start()..end].split('\n').count();
            if lines > max_lines {
                count += 1;
            }
        }
    }
    Evaluation::new(count, count > 0)
}

/// Byte offset of the `}` closing a block whose body starts at `from`.
fn matching_brace(content: &str, from: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, ch) in content[from..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(from + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Sliding windows of `window` lines; windows whose trimmed text is at most
/// `min_chars` long are ignored. Triggered when fewer than `1 - max_ratio` of
/// the windows are unique.
pub fn duplication<'a>(
    files: impl Iterator<Item = &'a FileRecord>,
    window: usize,
    min_chars: usize,
    max_ratio: f64,
) -> Evaluation {
    let window = window.max(1);
    let mut total = 0usize;
    let mut unique: HashSet<&'a str> = HashSet::new();

    for file in files {
        let content = file.content.as_str();
        let starts = line_starts(content);
        if starts.len() < window {
            continue;
        }
        for i in 0..=(starts.len() - window) {
            let begin = starts[i];
            let end = match starts.get(i + window) {
                Some(next) => next - 1,
                None => content.len(),
            };
            let segment = &content[begin..end];
            if segment.trim().chars().count() > min_chars {
                total += 1;
                unique.insert(segment);
            }
        }
    }

    let duplicates = total - unique.len();
    let triggered = (unique.len() as f64) < (total as f64) * (1.0 - max_ratio);
    Evaluation::new(duplicates, triggered)
}

fn line_starts(content: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(content.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Triggered when both space- and tab-indented lines make up more than
/// `threshold` of all indented lines.
pub fn mixed_indentation<'a>(
    files: impl Iterator<Item = &'a FileRecord>,
    threshold: f64,
) -> Evaluation {
    let (mut spaces, mut tabs) = (0usize, 0usize);
    for file in files {
        for line in file.content.split('\n') {
            if line.starts_with(' ') {
                spaces += 1;
            } else if line.starts_with('\t') {
                tabs += 1;
            }
        }
    }
    let total = spaces + tabs;
    if total == 0 {
        return Evaluation::new(0, false);
    }
    let triggered =
        spaces as f64 / total as f64 > threshold && tabs as f64 / total as f64 > threshold;
    Evaluation::new(if triggered { spaces.min(tabs) } else { 0 }, triggered)
}

fn entries_under<'a>(
    entries: &'a [EntryRecord],
    under: Option<&'a str>,
    recursive: bool,
) -> impl Iterator<Item = &'a EntryRecord> + 'a {
    let prefix = under.map(|u| u.trim_matches('/')).filter(|u| !u.is_empty());
    entries.iter().filter(move |e| {
        let rel = e.relative_path.as_str();
        let parent = rel.rfind('/').map(|i| &rel[..i]).unwrap_or("");
        match prefix {
            None => recursive || parent.is_empty(),
            Some(p) => {
                if recursive {
                    rel.len() > p.len() + 1 && rel.starts_with(p) && rel.as_bytes()[p.len()] == b'/'
                } else {
                    parent == p
                }
            }
        }
    })
}

fn kind_matches(kind: EntryKind, entry: &EntryRecord) -> bool {
    match kind {
        EntryKind::Any => true,
        EntryKind::Dir => entry.is_dir,
        EntryKind::File => !entry.is_dir,
    }
}

fn entry_extension(entry: &EntryRecord) -> String {
    entry.name().rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content: &str) -> FileRecord {
        FileRecord {
            path: "/repo/a.js".into(),
            name: "a.js".into(),
            extension: "js".into(),
            content: content.into(),
        }
    }

    fn entry(path: &str, is_dir: bool, size: u64) -> EntryRecord {
        EntryRecord { relative_path: path.into(), is_dir, size }
    }

    #[test]
    fn duplication_with_no_segments_is_quiet() {
        let files = [file("a\nb\n")];
        let eval = duplication(files.iter(), 3, 50, 0.1);
        assert!(!eval.satisfied);
        assert_eq!(eval.occurrence_count, 0);
    }

    #[test]
    fn duplication_detects_repeated_blocks() {
        let block = "let first_value = compute_something_expensive(1);\nlet second = compute_other(2);\nlet third = first_value + second;\n";
        let content = format!("{block}{block}{block}");
        let files = [file(&content)];
        assert!(duplication(files.iter(), 3, 50, 0.1).satisfied);
    }

    #[test]
    fn long_function_counts_brace_bodies() {
        let body = "    x += 1;\n".repeat(120);
        let content = format!("function big() {{\n{body}}}\nfunction small() {{ return 1; }}\n");
        let files = [file(&content)];
        let header = regex::Regex::new(r"function\s+\w+\s*\([^)]*\)\s*\{").unwrap();
        assert_eq!(long_functions(files.iter(), &header, 100), Evaluation::new(1, true));
    }

    #[test]
    fn entries_under_respects_depth() {
        let entries = vec![
            entry("lib", true, 0),
            entry("lib/models", true, 0),
            entry("lib/models/deep", true, 0),
            entry("src", true, 0),
        ];
        let top: Vec<_> = entries_under(&entries, None, false).map(|e| e.name()).collect();
        assert_eq!(top, vec!["lib", "src"]);
        let lib: Vec<_> = entries_under(&entries, Some("lib"), false).map(|e| e.name()).collect();
        assert_eq!(lib, vec!["models"]);
        let all: Vec<_> = entries_under(&entries, Some("lib"), true).map(|e| e.name()).collect();
        assert_eq!(all, vec!["models", "deep"]);
    }
}
