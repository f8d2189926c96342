use std::fs;
use std::path::Path;

use chrono::{Duration, Utc};
use repo_gauge::commands::describe_age;
use repo_gauge::{canonicalize_or_current, infer_workspace_name};
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_resolves_existing_path() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("nested");
    fs::create_dir_all(&nested).expect("create nested");

    let result = canonicalize_or_current(nested.to_str().expect("utf8 path")).expect("canonicalize");
    assert_eq!(result, nested.canonicalize().expect("canonicalize nested"));
}

#[test]
fn canonicalize_or_current_joins_missing_relative_path_onto_cwd() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current("definitely-missing-dir-xyz").expect("fallback");
    assert_eq!(result, cwd.join("definitely-missing-dir-xyz"));
}

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let cwd = std::env::current_dir().expect("cwd");
    assert_eq!(canonicalize_or_current(".").expect("dot"), cwd);
}

#[test]
fn infer_workspace_name_uses_last_component() {
    assert_eq!(infer_workspace_name(Path::new("/tmp/my-workspace")), "my-workspace");
    assert_eq!(infer_workspace_name(Path::new("/")), "unnamed-workspace");
}

#[test]
fn describe_age_picks_the_largest_whole_unit() {
    let now = Utc::now();
    assert_eq!(describe_age(now - Duration::seconds(42), now), "42s");
    assert_eq!(describe_age(now - Duration::minutes(5), now), "5m");
    assert_eq!(describe_age(now - Duration::hours(3), now), "3h");
    assert_eq!(describe_age(now - Duration::days(2), now), "2d");
    // Clock skew never shows a negative age.
    assert_eq!(describe_age(now + Duration::seconds(10), now), "0s");
}
