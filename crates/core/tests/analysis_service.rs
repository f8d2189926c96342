use std::fs;
use std::sync::Arc;

use gauge_core::model::{Category, VariantTag};
use gauge_core::rules::RuleRegistry;
use gauge_core::services::{Analyzer, AnalyzerOptions};
use tempfile::tempdir;

fn analyzer(concurrency: usize) -> Analyzer {
    let registry = Arc::new(RuleRegistry::builtin().expect("builtin tables"));
    Analyzer::new(registry, AnalyzerOptions { rule_concurrency: concurrency, ..Default::default() })
        .expect("analyzer")
}

#[test]
fn single_eval_call_costs_one_security_issue() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("app.js"), "// evaluate input\neval(x)\n").unwrap();

    let outcome = analyzer(4).run(dir.path(), &VariantTag::unknown());
    assert_eq!(outcome.variant.as_str(), "default");
    assert_eq!(outcome.files_loaded, 1);

    let triggered: Vec<&str> =
        outcome.findings.iter().filter(|f| f.triggered).map(|f| f.rule_id.as_str()).collect();
    assert_eq!(triggered, vec!["default.security.unsafe-functions"]);

    let result = &outcome.result;
    assert_eq!(result.score, 92);
    assert_eq!(result.category(Category::Security).score, 88);
    assert_eq!(result.category(Category::Security).issues, vec!["unsafe functions like eval or exec".to_string()]);
    assert_eq!(result.category(Category::Memory).score, 100);
    assert_eq!(
        result.recommendations,
        vec!["To improve security: address unsafe functions like eval or exec".to_string()]
    );
}

#[test]
fn empty_repository_scores_one_hundred() {
    let dir = tempdir().expect("tempdir");
    let outcome = analyzer(2).run(dir.path(), &VariantTag::unknown());

    assert_eq!(outcome.files_loaded, 0);
    assert!(outcome.findings.iter().all(|f| !f.triggered));
    assert_eq!(outcome.result.score, 100);
    assert!(outcome.result.recommendations.is_empty());
    for category in Category::SCORED {
        assert_eq!(outcome.result.category(category).score, 100);
    }
}

#[test]
fn one_finding_per_rule_in_table_order() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("main.dart"), "void main() { print('hi'); }\n").unwrap();

    let a = analyzer(1);
    let tag = VariantTag::new("flutter");
    let table = a.table_for(&tag);
    let corpus = a.load(dir.path(), &tag);
    let findings = a.analyze(&corpus, &tag);

    let expected: Vec<&str> = table.rules.iter().map(|r| r.id.as_str()).collect();
    let actual: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
    assert_eq!(actual, expected);
}

#[test]
fn rule_concurrency_does_not_change_results() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join("src")).unwrap();
    fs::write(
        dir.path().join("src/app.js"),
        "const password = 'hunter2';\nsetInterval(poll, 10);\nel.addEventListener('x', f);\nfetch('http://example.com');\n",
    )
    .unwrap();
    fs::write(dir.path().join("README.md"), "# demo\n").unwrap();

    let serial = analyzer(1).run(dir.path(), &VariantTag::unknown());
    let parallel = analyzer(8).run(dir.path(), &VariantTag::unknown());
    assert_eq!(serial.findings, parallel.findings);
    assert_eq!(serial.result, parallel.result);
    assert!(serial.result.score < 100);
}

#[test]
fn analyzer_can_be_shared_across_threads() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("a.js"), "// evaluate input\neval(x)\n").unwrap();
    let shared = Arc::new(analyzer(2));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let a = Arc::clone(&shared);
            let root = dir.path().to_path_buf();
            std::thread::spawn(move || a.run(&root, &VariantTag::unknown()).result.score)
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().expect("thread"), 92);
    }
}
