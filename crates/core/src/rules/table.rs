//! Serializable rule table documents and their compilation into [`VariantTable`]s.
//!
//! Tables are YAML (or JSON) documents:
//!
//! ```yaml
//! tag: flutter
//! name: Flutter
//! extensions: [dart, yaml]
//! code_extensions: [dart]
//! rules:
//!   - id: flutter.memory.listener-leak
//!     category: memory
//!     message: potential memory leak from listeners not removed in dispose
//!     signal:
//!       all_of:
//!         - patterns: { include: ['addListener', 'initState'] }
//!         - absent: { patterns: { include: ['removeListener', 'dispose'] } }
//! ```
//!
//! Pattern sets and heuristics without a `files` filter look at the table's
//! `code_extensions`; `files: {}` selects every loaded file.

use std::collections::{BTreeSet, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::corpus::normalize_extensions;
use crate::model::Category;
use crate::rules::{
    EntryKind, FileFilter, Heuristic, PatternSet, Rule, RuleError, Signal, VariantTable,
};

/// Comment markers used by `comment_ratio` when a table does not list its own.
pub const DEFAULT_COMMENT_MARKERS: &[&str] = &["//", "/*", "*", "#", "///", "\"\"\""];

/// Header pattern used by `long_functions` when a table does not give one.
pub const DEFAULT_FUNCTION_HEADER: &str = r"\b(?:function|func|fun|def|void)\s+\w+\s*\([^)]*\)[^{;]*\{|\b(?:public|private|protected|internal)\s+(?:static\s+)?(?:async\s+)?[\w<>\[\],]+\s+\w+\s*\([^)]*\)[^{;]*\{";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub extensions: Vec<String>,
    #[serde(default)]
    pub code_extensions: Vec<String>,
    pub rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub id: String,
    pub category: Category,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    pub signal: SignalSpec,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileFilterSpec {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternSetSpec {
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub min_occurrences: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<FileFilterSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSpec {
    Patterns(PatternSetSpec),
    AllOf(Vec<SignalSpec>),
    AnyOf(Vec<SignalSpec>),
    Absent(Box<SignalSpec>),
    Heuristic(HeuristicSpec),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HeuristicSpec {
    CommentRatio {
        min_ratio: f64,
        #[serde(default)]
        markers: Vec<String>,
        #[serde(default)]
        files: Option<FileFilterSpec>,
    },
    LongFunctions {
        max_lines: usize,
        #[serde(default)]
        header: Option<String>,
        #[serde(default)]
        files: Option<FileFilterSpec>,
    },
    Duplication {
        #[serde(default = "default_window")]
        window: usize,
        #[serde(default = "default_min_chars")]
        min_chars: usize,
        max_ratio: f64,
        #[serde(default)]
        files: Option<FileFilterSpec>,
    },
    MixedIndentation {
        threshold: f64,
        #[serde(default)]
        files: Option<FileFilterSpec>,
    },
    PathsPresent {
        #[serde(default)]
        under: Option<String>,
        #[serde(default)]
        names: Vec<String>,
        #[serde(default)]
        name_pattern: Option<String>,
        #[serde(default)]
        entry: EntryKind,
        #[serde(default)]
        recursive: bool,
        #[serde(default = "default_min_count")]
        min_count: usize,
    },
    LargeFiles {
        #[serde(default)]
        under: Option<String>,
        #[serde(default)]
        extensions: Vec<String>,
        max_bytes: u64,
    },
    FileLength {
        max_chars: usize,
        #[serde(default)]
        files: Option<FileFilterSpec>,
    },
    PatternRatio {
        subject: String,
        counterpart: String,
        max_ratio: f64,
        #[serde(default)]
        files: Option<FileFilterSpec>,
    },
}

fn default_window() -> usize {
    3
}

fn default_min_chars() -> usize {
    50
}

fn default_min_count() -> usize {
    1
}

impl TableSpec {
    /// Tables write signals as single-key maps (`signal: { any_of: [...] }`),
    /// which serde_yaml only accepts as `!tag` values for enums. Going through a
    /// JSON value keeps the YAML and JSON forms identical.
    pub fn from_yaml(source_name: &str, text: &str) -> Result<Self, RuleError> {
        let parse_err =
            |message: String| RuleError::Parse { source_name: source_name.to_string(), message };
        let value: serde_json::Value =
            serde_yaml::from_str(text).map_err(|e| parse_err(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| parse_err(e.to_string()))
    }

    pub fn from_json(source_name: &str, text: &str) -> Result<Self, RuleError> {
        serde_json::from_str(text).map_err(|e| RuleError::Parse {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
    }

    /// Validate and compile into a shareable table.
    pub fn compile(&self) -> Result<VariantTable, RuleError> {
        let tag = crate::model::VariantTag::new(&self.tag).as_str().to_string();
        if self.extensions.is_empty() {
            return Err(RuleError::InvalidTable {
                tag,
                message: "at least one extension is required".into(),
            });
        }

        let code_filter = FileFilter {
            extensions: normalize_extensions(&self.code_extensions),
            names: BTreeSet::new(),
        };
        let mut seen = HashSet::new();
        let mut rules = Vec::with_capacity(self.rules.len());
        for spec in &self.rules {
            if !seen.insert(spec.id.as_str()) {
                return Err(RuleError::InvalidTable {
                    tag,
                    message: format!("duplicate rule id '{}'", spec.id),
                });
            }
            rules.push(spec.compile(&code_filter)?);
        }

        Ok(VariantTable {
            name: self.name.clone().unwrap_or_else(|| self.tag.clone()),
            aliases: self
                .aliases
                .iter()
                .map(|a| crate::model::VariantTag::new(a).as_str().to_string())
                .collect(),
            extensions: normalize_extensions(&self.extensions).into_iter().collect(),
            tag,
            rules,
        })
    }
}

impl RuleSpec {
    pub fn compile(&self, code_filter: &FileFilter) -> Result<Rule, RuleError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(RuleError::InvalidRule {
                rule: self.id.clone(),
                message: "empty id".into(),
            });
        }
        if self.message.trim().is_empty() {
            return Err(RuleError::InvalidRule {
                rule: id.to_string(),
                message: "empty message".into(),
            });
        }
        let ctx = CompileCtx { rule: id, code_filter };
        Ok(Rule {
            id: id.to_string(),
            category: self.category,
            message: self.message.trim().to_string(),
            weight: self.weight.unwrap_or_else(|| self.category.default_weight()),
            signal: ctx.signal(&self.signal)?,
        })
    }
}

struct CompileCtx<'a> {
    rule: &'a str,
    code_filter: &'a FileFilter,
}

impl CompileCtx<'_> {
    fn signal(&self, spec: &SignalSpec) -> Result<Signal, RuleError> {
        Ok(match spec {
            SignalSpec::Patterns(set) => Signal::Patterns(self.pattern_set(set)?),
            SignalSpec::AllOf(children) => Signal::AllOf(self.children(children)?),
            SignalSpec::AnyOf(children) => Signal::AnyOf(self.children(children)?),
            SignalSpec::Absent(inner) => Signal::Absent(Box::new(self.signal(inner)?)),
            SignalSpec::Heuristic(h) => Signal::Heuristic(self.heuristic(h)?),
        })
    }

    fn children(&self, children: &[SignalSpec]) -> Result<Vec<Signal>, RuleError> {
        if children.is_empty() {
            return Err(self.invalid("composite signal needs at least one child"));
        }
        children.iter().map(|c| self.signal(c)).collect()
    }

    fn pattern_set(&self, spec: &PatternSetSpec) -> Result<PatternSet, RuleError> {
        if spec.include.is_empty() {
            return Err(self.invalid("pattern set needs at least one include pattern"));
        }
        Ok(PatternSet {
            include: self.regexes(&spec.include)?,
            exclude: self.regexes(&spec.exclude)?,
            min_occurrences: spec.min_occurrences,
            files: self.filter(spec.files.as_ref()),
        })
    }

    fn heuristic(&self, spec: &HeuristicSpec) -> Result<Heuristic, RuleError> {
        Ok(match spec {
            HeuristicSpec::CommentRatio { min_ratio, markers, files } => {
                let markers = if markers.is_empty() {
                    DEFAULT_COMMENT_MARKERS.iter().map(|m| m.to_string()).collect()
                } else {
                    markers.clone()
                };
                Heuristic::CommentRatio {
                    min_ratio: self.ratio("min_ratio", *min_ratio)?,
                    markers,
                    files: self.filter(files.as_ref()),
                }
            }
            HeuristicSpec::LongFunctions { max_lines, header, files } => {
                if *max_lines == 0 {
                    return Err(self.invalid("max_lines must be positive"));
                }
                let header = header.as_deref().unwrap_or(DEFAULT_FUNCTION_HEADER);
                Heuristic::LongFunctions {
                    max_lines: *max_lines,
                    header: self.regex(header)?,
                    files: self.filter(files.as_ref()),
                }
            }
            HeuristicSpec::Duplication { window, min_chars, max_ratio, files } => {
                if *window == 0 {
                    return Err(self.invalid("window must be positive"));
                }
                Heuristic::Duplication {
                    window: *window,
                    min_chars: *min_chars,
                    max_ratio: self.ratio("max_ratio", *max_ratio)?,
                    files: self.filter(files.as_ref()),
                }
            }
            HeuristicSpec::MixedIndentation { threshold, files } => Heuristic::MixedIndentation {
                threshold: self.ratio("threshold", *threshold)?,
                files: self.filter(files.as_ref()),
            },
            HeuristicSpec::PathsPresent {
                under,
                names,
                name_pattern,
                entry,
                recursive,
                min_count,
            } => {
                if names.is_empty() && name_pattern.is_none() {
                    return Err(self.invalid("paths_present needs names or a name_pattern"));
                }
                Heuristic::PathsPresent {
                    under: under.clone(),
                    names: names.iter().map(|n| n.to_ascii_lowercase()).collect(),
                    name_pattern: name_pattern.as_deref().map(|p| self.regex(p)).transpose()?,
                    entry: *entry,
                    recursive: *recursive,
                    min_count: *min_count,
                }
            }
            HeuristicSpec::LargeFiles { under, extensions, max_bytes } => Heuristic::LargeFiles {
                under: under.clone(),
                extensions: normalize_extensions(extensions),
                max_bytes: *max_bytes,
            },
            HeuristicSpec::FileLength { max_chars, files } => {
                Heuristic::FileLength { max_chars: *max_chars, files: self.filter(files.as_ref()) }
            }
            HeuristicSpec::PatternRatio { subject, counterpart, max_ratio, files } => {
                Heuristic::PatternRatio {
                    subject: self.regex(subject)?,
                    counterpart: self.regex(counterpart)?,
                    max_ratio: self.ratio("max_ratio", *max_ratio)?,
                    files: self.filter(files.as_ref()),
                }
            }
        })
    }

    fn filter(&self, spec: Option<&FileFilterSpec>) -> FileFilter {
        match spec {
            None => self.code_filter.clone(),
            Some(spec) => FileFilter {
                extensions: normalize_extensions(&spec.extensions),
                names: spec.names.iter().map(|n| n.trim().to_ascii_lowercase()).collect(),
            },
        }
    }

    fn regexes(&self, patterns: &[String]) -> Result<Vec<Regex>, RuleError> {
        patterns.iter().map(|p| self.regex(p)).collect()
    }

    fn regex(&self, pattern: &str) -> Result<Regex, RuleError> {
        Regex::new(pattern).map_err(|source| RuleError::Pattern {
            rule: self.rule.to_string(),
            pattern: pattern.to_string(),
            source,
        })
    }

    fn ratio(&self, field: &str, value: f64) -> Result<f64, RuleError> {
        if (0.0..=1.0).contains(&value) {
            Ok(value)
        } else {
            Err(self.invalid(&format!("{field} must be within 0..=1, got {value}")))
        }
    }

    fn invalid(&self, message: &str) -> RuleError {
        RuleError::InvalidRule { rule: self.rule.to_string(), message: message.to_string() }
    }
}
