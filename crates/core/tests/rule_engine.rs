use gauge_core::corpus::{Corpus, EntryRecord};
use gauge_core::model::{Category, FileRecord};
use gauge_core::rules::engine::{evaluate, finding};
use gauge_core::rules::{Rule, RuleError, TableSpec};

fn file(name: &str, content: &str) -> FileRecord {
    let extension = name.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    FileRecord {
        path: format!("/repo/{name}").into(),
        name: name.to_string(),
        extension,
        content: content.to_string(),
    }
}

fn corpus(files: &[(&str, &str)]) -> Corpus {
    Corpus::from_files("/repo", files.iter().map(|(n, c)| file(n, c)).collect())
}

/// Compile one rule with `signal` (YAML) inside a throwaway table.
fn rule(category: &str, signal: &str) -> Rule {
    let indented: String = signal.lines().map(|l| format!("      {l}\n")).collect();
    let yaml = format!(
        "tag: test\nextensions: [js]\ncode_extensions: [js]\nrules:\n  - id: t.rule\n    category: {category}\n    message: test rule\n    signal:\n{indented}"
    );
    let table = TableSpec::from_yaml("test.yaml", &yaml).expect("parse").compile().expect("compile");
    table.rules.into_iter().next().expect("one rule")
}

#[test]
fn include_patterns_count_every_match() {
    let r = rule("security", "patterns: { include: ['eval\\(', 'exec\\('] }");
    let c = corpus(&[("a.js", "eval(a); eval(b); exec(c)"), ("b.js", "nothing")]);
    let eval = evaluate(&c, &r);
    assert!(eval.satisfied);
    assert_eq!(eval.occurrence_count, 3);
}

#[test]
fn exclude_pattern_silences_a_whole_file() {
    let r = rule("memory", "patterns: { include: [addEventListener], exclude: [removeEventListener] }");
    let c = corpus(&[
        ("a.js", "el.addEventListener('x', f); el.removeEventListener('x', f);"),
        ("b.js", "el.addEventListener('y', g);"),
    ]);
    assert_eq!(evaluate(&c, &r).occurrence_count, 1);

    let clean = corpus(&[("a.js", "el.addEventListener('x', f); el.removeEventListener('x', f);")]);
    assert!(!evaluate(&clean, &r).satisfied);
}

#[test]
fn min_occurrences_sums_across_patterns_and_files() {
    let r = rule("performance", "patterns: { include: [foo, bar], min_occurrences: 3 }");
    assert!(!evaluate(&corpus(&[("a.js", "foo bar")]), &r).satisfied);
    assert!(evaluate(&corpus(&[("a.js", "foo"), ("b.js", "bar bar")]), &r).satisfied);
}

#[test]
fn code_filter_applies_unless_files_is_overridden() {
    let scoped = rule("security", "patterns: { include: [secret] }");
    let everywhere = rule("security", "patterns: { include: [secret], files: {} }");
    let c = corpus(&[("config.json", "{\"secret\": 1}")]);
    assert!(!evaluate(&c, &scoped).satisfied);
    assert!(evaluate(&c, &everywhere).satisfied);
}

#[test]
fn all_of_needs_every_child() {
    let r = rule(
        "performance",
        "all_of:\n  - patterns: { include: ['for\\s*\\('] }\n  - patterns: { include: ['\\.length'] }",
    );
    assert!(evaluate(&corpus(&[("a.js", "for (i = 0; i < a.length; i++) {}")]), &r).satisfied);
    assert!(!evaluate(&corpus(&[("a.js", "for (;;) {}")]), &r).satisfied);
}

#[test]
fn absent_fires_when_inner_signal_does_not() {
    let r = rule("weakness", "absent:\n  patterns: { include: [\"'use strict'\"] }");
    assert!(evaluate(&corpus(&[("a.js", "var x = 1;")]), &r).satisfied);
    assert!(!evaluate(&corpus(&[("a.js", "'use strict';")]), &r).satisfied);
}

#[test]
fn no_rule_fires_on_an_empty_corpus() {
    let empty = Corpus::default();
    let absent = rule("weakness", "absent:\n  patterns: { include: [anything] }");
    let comments = rule("weakness", "heuristic: { kind: comment_ratio, min_ratio: 0.5 }");
    for r in [absent, comments] {
        let eval = evaluate(&empty, &r);
        assert!(!eval.satisfied);
        assert_eq!(eval.occurrence_count, 0);
    }
}

#[test]
fn tree_listing_alone_does_not_fire_structural_rules() {
    let r = rule("strength", "heuristic: { kind: paths_present, names: [readme.md] }");
    let readme = EntryRecord { relative_path: "README.md".into(), is_dir: false, size: 10 };

    let mut listing_only = Corpus::default();
    listing_only.entries.push(readme.clone());
    assert!(!evaluate(&listing_only, &r).satisfied);

    let mut with_code = corpus(&[("a.js", "run();")]);
    with_code.entries.push(readme);
    assert!(evaluate(&with_code, &r).satisfied);
}

#[test]
fn comment_ratio_triggers_below_threshold() {
    let r = rule("weakness", "heuristic: { kind: comment_ratio, min_ratio: 0.25 }");
    let sparse = corpus(&[("a.js", "a();\nb();\nc();\nd();\n// one")]);
    let dense = corpus(&[("a.js", "// doc\na();\n// more\nb();")]);
    assert!(evaluate(&sparse, &r).satisfied);
    assert!(!evaluate(&dense, &r).satisfied);
}

#[test]
fn mixed_indentation_needs_both_styles() {
    let r = rule("weakness", "heuristic: { kind: mixed_indentation, threshold: 0.15 }");
    let mixed = corpus(&[("a.js", "{\n  a();\n\tb();\n  c();\n\td();\n}")]);
    let spaces = corpus(&[("a.js", "{\n  a();\n  b();\n}")]);
    assert!(evaluate(&mixed, &r).satisfied);
    assert!(!evaluate(&spaces, &r).satisfied);
}

#[test]
fn duplication_flags_repeated_windows() {
    let r = rule("weakness", "heuristic: { kind: duplication, window: 2, min_chars: 10, max_ratio: 0.1 }");
    let block = "const first = compute(alpha);\nconst second = compute(beta);\n";
    let text = block.repeat(4);
    let repeated = corpus(&[("a.js", text.as_str())]);
    let unique = corpus(&[("a.js", "const a = one(1);\nconst b = two(2);\nconst c = three(3);\n")]);
    assert!(evaluate(&repeated, &r).satisfied);
    assert!(!evaluate(&unique, &r).satisfied);
}

#[test]
fn long_functions_counts_bodies_over_the_limit() {
    let r = rule("weakness", "heuristic: { kind: long_functions, max_lines: 5 }");
    let long_body = format!("function big() {{\n{}}}\n", "  step();\n".repeat(10));
    let text = format!("{long_body}function small() {{\n  ok();\n}}\n");
    let c = corpus(&[("a.js", text.as_str())]);
    let eval = evaluate(&c, &r);
    assert!(eval.satisfied);
    assert_eq!(eval.occurrence_count, 1);
}

#[test]
fn finding_carries_rule_identity_and_default_weight() {
    let r = rule("security", "patterns: { include: ['eval\\('] }");
    let f = finding(&corpus(&[("a.js", "eval(x)")]), &r);
    assert_eq!(f.rule_id, "t.rule");
    assert_eq!(f.category, Category::Security);
    assert_eq!(f.weight, Category::Security.default_weight());
    assert!(f.triggered);
    assert_eq!(f.occurrence_count, 1);
}

#[test]
fn evaluation_is_deterministic() {
    let r = rule("security", "patterns: { include: [token, secret] }");
    let c = corpus(&[("a.js", "token secret token"), ("b.js", "secret")]);
    let first = evaluate(&c, &r);
    for _ in 0..5 {
        assert_eq!(evaluate(&c, &r), first);
    }
}

#[test]
fn invalid_regex_is_rejected_at_compile_time() {
    let yaml = "tag: bad\nextensions: [js]\nrules:\n  - id: bad.rule\n    category: security\n    message: broken\n    signal:\n      patterns: { include: ['eval('] }\n";
    let err = TableSpec::from_yaml("bad.yaml", yaml).expect("parse").compile().unwrap_err();
    assert!(matches!(err, RuleError::Pattern { ref rule, .. } if rule == "bad.rule"), "{err}");
}

#[test]
fn duplicate_rule_ids_are_rejected() {
    let yaml = "tag: dup\nextensions: [js]\nrules:\n  - id: same\n    category: memory\n    message: a\n    signal: { patterns: { include: [a] } }\n  - id: same\n    category: memory\n    message: b\n    signal: { patterns: { include: [b] } }\n";
    let err = TableSpec::from_yaml("dup.yaml", yaml).expect("parse").compile().unwrap_err();
    assert!(matches!(err, RuleError::InvalidTable { .. }), "{err}");
}
