use std::path::Path;

use chrono::{DateTime, Utc};
use gauge_core::model::{AnalysisResult, Category, StoredReport};

/// Helper to print whether a directory exists.
pub fn print_dir_status(label: &str, path: &Path) {
    let exists = path.is_dir();
    println!("- {label}: {} ({})", if exists { "OK" } else { "MISSING" }, path.display());
}

/// Human-readable rendering of a scored result.
pub fn print_analysis_result(result: &AnalysisResult) {
    println!("Score: {}/100", result.score);
    println!();
    println!("Categories:");
    for category in Category::SCORED {
        let report = result.category(category);
        println!(
            "  {:<12} {:>3}  ({} issue(s))",
            category.as_str(),
            report.score,
            report.issues.len()
        );
        for issue in &report.issues {
            println!("      - {issue}");
        }
    }

    if !result.strengths.is_empty() {
        println!();
        println!("Strengths:");
        for s in &result.strengths {
            println!("  + {s}");
        }
    }
    if !result.weaknesses.is_empty() {
        println!();
        println!("Weaknesses:");
        for w in &result.weaknesses {
            println!("  - {w}");
        }
    }
    if !result.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for (i, r) in result.recommendations.iter().enumerate() {
            println!("  {}. {r}", i + 1);
        }
    }
}

pub fn print_stored_report(report: &StoredReport) {
    println!("Report {}", report.result_ref);
    println!("  Repository: {}", report.repo_ref);
    println!("  Requester: {}", report.requester_id);
    println!("  Variant: {}", report.variant);
    println!("  Created: {}", report.created_at.to_rfc3339());
    if let Some(fingerprint) = &report.fingerprint {
        println!("  Corpus: {}", &fingerprint[..fingerprint.len().min(12)]);
    }
    println!();
    print_analysis_result(&report.result);
}

/// Coarse "how long ago" for listings (`42s`, `5m`, `3h`, `2d`).
pub fn describe_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}
