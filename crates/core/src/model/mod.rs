//! Report model shared by the engine, the aggregator, and the stores.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One source file loaded for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub name: String,
    /// Lowercase extension without the leading dot (empty when the file has none).
    pub extension: String,
    pub content: String,
}

/// Finding category. Strengths add to the score; everything else subtracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Strength,
    Weakness,
    Performance,
    Memory,
    Battery,
    Security,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Strength,
        Category::Weakness,
        Category::Performance,
        Category::Memory,
        Category::Battery,
        Category::Security,
    ];

    /// Categories that get their own sub-score in a report.
    pub const SCORED: [Category; 4] =
        [Category::Performance, Category::Memory, Category::Battery, Category::Security];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Strength => "strength",
            Category::Weakness => "weakness",
            Category::Performance => "performance",
            Category::Memory => "memory",
            Category::Battery => "battery",
            Category::Security => "security",
        }
    }

    /// Composite-score weight used when a rule does not set its own.
    pub fn default_weight(&self) -> u32 {
        match self {
            Category::Strength => 4,
            Category::Weakness => 5,
            Category::Performance => 6,
            Category::Memory => 7,
            Category::Battery => 6,
            Category::Security => 8,
        }
    }

    /// Recommendation priority; higher sorts first. Strengths never become recommendations.
    pub fn priority(&self) -> u8 {
        match self {
            Category::Strength => 0,
            Category::Weakness => 1,
            Category::Performance | Category::Memory | Category::Battery => 2,
            Category::Security => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strength" => Ok(Category::Strength),
            "weakness" => Ok(Category::Weakness),
            "performance" => Ok(Category::Performance),
            "memory" => Ok(Category::Memory),
            "battery" => Ok(Category::Battery),
            "security" => Ok(Category::Security),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// Outcome of evaluating one rule against one corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub category: Category,
    pub message: String,
    pub weight: u32,
    pub triggered: bool,
    pub occurrence_count: usize,
}

/// Per-category sub-score and the issues that lowered it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategoryReport {
    pub score: u8,
    pub issues: Vec<String>,
}

/// Final, immutable output of one analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub score: u8,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub per_category: BTreeMap<Category, CategoryReport>,
    pub recommendations: Vec<String>,
}

impl AnalysisResult {
    /// Sub-report for a scored category (empty report with score 100 when absent).
    pub fn category(&self, category: Category) -> CategoryReport {
        self.per_category
            .get(&category)
            .cloned()
            .unwrap_or(CategoryReport { score: 100, issues: Vec::new() })
    }

    /// Total number of issues across weaknesses and scored categories.
    pub fn issue_count(&self) -> usize {
        self.weaknesses.len() + self.per_category.values().map(|c| c.issues.len()).sum::<usize>()
    }
}

/// Technology variant tag produced by the classifier and used to pick a rule table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantTag(String);

impl VariantTag {
    pub const UNKNOWN: &'static str = "unknown";
    pub const DEFAULT: &'static str = "default";

    /// Build a tag, normalizing case and separators (`React Native` -> `react-native`).
    pub fn new(tag: impl AsRef<str>) -> Self {
        let normalized = tag
            .as_ref()
            .trim()
            .to_ascii_lowercase()
            .split(|c: char| c.is_whitespace() || c == '_')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-");
        if normalized.is_empty() {
            Self(Self::UNKNOWN.to_string())
        } else {
            Self(normalized)
        }
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == Self::UNKNOWN
    }
}

impl fmt::Display for VariantTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VariantTag {
    fn from(value: &str) -> Self {
        VariantTag::new(value)
    }
}

/// A finished report as persisted in the report store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredReport {
    pub result_ref: String,
    pub repo_ref: String,
    pub requester_id: String,
    pub variant: VariantTag,
    pub created_at: DateTime<Utc>,
    pub result: AnalysisResult,
    /// SHA-256 over the analyzed files, when the report came from a corpus walk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Externally visible job lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Active,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Active => "active",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "active" => Ok(JobState::Active),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state '{other}'")),
        }
    }
}

/// One scheduled analysis.
///
/// `result_ref` is allocated at submit time; a report exists under it only once
/// the job is `completed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub repo_ref: String,
    pub requester_id: String,
    pub state: JobState,
    pub progress: u8,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub result_ref: String,
}

impl Job {
    pub fn new(
        repo_ref: impl Into<String>,
        requester_id: impl Into<String>,
        result_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_ref: repo_ref.into(),
            requester_id: requester_id.into(),
            state: JobState::Queued,
            progress: 0,
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            failure_reason: None,
            result_ref: result_ref.into(),
        }
    }
}

/// Duplicate-submission key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey {
    pub repo_ref: String,
    pub requester_id: String,
}

impl DedupKey {
    pub fn new(repo_ref: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self { repo_ref: repo_ref.into(), requester_id: requester_id.into() }
    }
}
