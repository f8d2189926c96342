use std::fs;

use gauge_core::model::{Category, VariantTag};
use gauge_core::rules::{RuleError, RuleRegistry};
use tempfile::tempdir;

const BUILTIN_TAGS: [&str; 6] = ["android", "default", "flutter", "ios", "react-native", "xamarin"];

#[test]
fn every_builtin_table_compiles() {
    let registry = RuleRegistry::builtin().expect("builtin tables");
    assert_eq!(registry.tags(), BUILTIN_TAGS.to_vec());
    for table in registry.tables() {
        assert!(!table.rules.is_empty(), "{} has no rules", table.tag);
        assert!(!table.extensions.is_empty(), "{} loads no files", table.tag);
    }
}

#[test]
fn builtin_tables_cover_every_category() {
    let registry = RuleRegistry::builtin().expect("builtin tables");
    for table in registry.tables() {
        let covered = table.covered_categories();
        for category in Category::ALL {
            assert!(covered.contains(&category), "{} lacks {category}", table.tag);
        }
    }
}

#[test]
fn rule_ids_are_unique_across_tables() {
    let registry = RuleRegistry::builtin().expect("builtin tables");
    let mut ids: Vec<&str> = registry.tables().flat_map(|t| t.rules.iter().map(|r| r.id.as_str())).collect();
    let total = ids.len();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), total);
}

#[test]
fn unknown_variants_resolve_to_default() {
    let registry = RuleRegistry::builtin().expect("builtin tables");
    assert_eq!(registry.resolve(&VariantTag::unknown()).tag, "default");
    assert_eq!(registry.resolve(&VariantTag::new("cobol")).tag, "default");
}

#[test]
fn aliases_and_spellings_resolve_to_their_table() {
    let registry = RuleRegistry::builtin().expect("builtin tables");
    assert_eq!(registry.resolve(&VariantTag::new("React Native")).tag, "react-native");
    assert_eq!(registry.resolve(&VariantTag::new("rn")).tag, "react-native");
    assert_eq!(registry.resolve(&VariantTag::new("dart")).tag, "flutter");
    assert_eq!(registry.resolve(&VariantTag::new("swift")).tag, "ios");
    assert_eq!(registry.resolve(&VariantTag::new("maui")).tag, "xamarin");
    assert_eq!(registry.resolve(&VariantTag::new("native_android")).tag, "android");
}

#[test]
fn override_directory_replaces_tables_by_tag() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("flutter.yaml"),
        r#"
tag: flutter
name: Custom Flutter
extensions: [dart]
rules:
  - id: custom.print
    category: weakness
    message: Debug prints left in code
    signal:
      patterns: { include: ['print\('] }
"#,
    )
    .unwrap();
    fs::write(dir.path().join("README.txt"), "not a table").unwrap();

    let registry = RuleRegistry::with_overrides(dir.path()).expect("overrides");
    let flutter = registry.resolve(&VariantTag::new("flutter"));
    assert_eq!(flutter.name, "Custom Flutter");
    assert_eq!(flutter.rules.len(), 1);
    // Other built-ins are untouched.
    assert_eq!(registry.tags().len(), BUILTIN_TAGS.len());
}

#[test]
fn default_override_must_cover_every_category() {
    let dir = tempdir().expect("tempdir");
    fs::write(
        dir.path().join("default.json"),
        r#"{"tag":"default","extensions":["js"],"rules":[
            {"id":"d.sec","category":"security","message":"eval","signal":{"patterns":{"include":["eval"]}}}
        ]}"#,
    )
    .unwrap();

    let err = RuleRegistry::with_overrides(dir.path()).unwrap_err();
    assert!(matches!(err, RuleError::InvalidTable { .. }), "{err}");
}

#[test]
fn malformed_override_reports_its_source() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("broken.yaml"), "tag: [unclosed").unwrap();
    let err = RuleRegistry::with_overrides(dir.path()).unwrap_err();
    assert!(matches!(err, RuleError::Parse { ref source_name, .. } if source_name.ends_with("broken.yaml")), "{err}");
}
