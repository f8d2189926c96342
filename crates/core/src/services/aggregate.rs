//! Findings to score and ranked recommendations.

use std::collections::{BTreeMap, HashSet};

use tracing::error;

use crate::model::{AnalysisResult, Category, CategoryReport, Finding};

/// Recommendation list cap.
pub const MAX_RECOMMENDATIONS: usize = 10;

/// Cap on the composite bonus contributed by strengths.
pub const STRENGTH_BONUS_CAP: u64 = 20;

/// Sub-score for one scored category given its triggered issue count.
pub fn category_score(category: Category, triggered: usize) -> u8 {
    let per_issue: u64 = match category {
        Category::Security => 12,
        _ => 10,
    };
    100u64.saturating_sub(per_issue.saturating_mul(triggered as u64)) as u8
}

/// `100 + min(strength weights, 20) - issue weights`, clamped to `[0, 100]`.
pub fn composite_score(findings: &[Finding]) -> u8 {
    let mut bonus = 0u64;
    let mut penalty = 0u64;
    for finding in findings.iter().filter(|f| f.triggered) {
        match finding.category {
            Category::Strength => bonus = bonus.saturating_add(finding.weight as u64),
            _ => penalty = penalty.saturating_add(finding.weight as u64),
        }
    }
    let score = (100 + bonus.min(STRENGTH_BONUS_CAP)).saturating_sub(penalty).min(100);
    score as u8
}

/// Render one issue through its category template.
pub fn render_recommendation(category: Category, message: &str) -> String {
    match category {
        Category::Weakness => format!("Improve: {message}"),
        Category::Performance => format!("To improve performance: address {message}"),
        Category::Memory => format!("To reduce memory usage: address {message}"),
        Category::Battery => format!("To improve battery life: address {message}"),
        Category::Security => format!("To improve security: address {message}"),
        Category::Strength => message.to_string(),
    }
}

/// Triggered issues ordered by descending priority (stable), rendered,
/// deduplicated by text, and capped at [`MAX_RECOMMENDATIONS`].
pub fn recommendations(findings: &[Finding]) -> Vec<String> {
    let mut issues: Vec<&Finding> =
        findings.iter().filter(|f| f.triggered && f.category != Category::Strength).collect();
    issues.sort_by(|a, b| b.category.priority().cmp(&a.category.priority()));

    let mut seen = HashSet::new();
    issues
        .into_iter()
        .map(|f| render_recommendation(f.category, &f.message))
        .filter(|text| seen.insert(text.clone()))
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

/// Fold findings into a report. Pure: the same findings always give the same result.
pub fn aggregate(findings: &[Finding]) -> AnalysisResult {
    let triggered_in = |category: Category| -> Vec<String> {
        findings
            .iter()
            .filter(|f| f.triggered && f.category == category)
            .map(|f| f.message.clone())
            .collect()
    };

    let mut per_category = BTreeMap::new();
    for category in Category::SCORED {
        let issues = triggered_in(category);
        let score = category_score(category, issues.len());
        per_category.insert(category, CategoryReport { score, issues });
    }

    let score = composite_score(findings);
    if score > 100 || per_category.values().any(|c| c.score > 100) {
        error!(score, "aggregated score out of range");
        debug_assert!(false, "aggregated score out of range");
    }

    AnalysisResult {
        score,
        strengths: triggered_in(Category::Strength),
        weaknesses: triggered_in(Category::Weakness),
        per_category,
        recommendations: recommendations(findings),
    }
}
