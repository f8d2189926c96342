use gauge_core::model::{Category, Finding};
use gauge_core::services::aggregate::{
    aggregate, category_score, composite_score, recommendations, MAX_RECOMMENDATIONS,
};
use proptest::prelude::*;

fn finding(category: Category, message: &str, triggered: bool) -> Finding {
    Finding {
        rule_id: format!("{category}.{message}"),
        category,
        message: message.to_string(),
        weight: category.default_weight(),
        triggered,
        occurrence_count: usize::from(triggered),
    }
}

fn arb_finding() -> impl Strategy<Value = Finding> {
    (0usize..Category::ALL.len(), 0u32..40, any::<bool>(), "[a-z]{1,6}").prop_map(
        |(idx, weight, triggered, message)| Finding {
            rule_id: format!("p.{message}"),
            category: Category::ALL[idx],
            message,
            weight,
            triggered,
            occurrence_count: 0,
        },
    )
}

proptest! {
    #[test]
    fn scores_stay_in_range(findings in prop::collection::vec(arb_finding(), 0..60)) {
        let result = aggregate(&findings);
        prop_assert!(result.score <= 100);
        prop_assert_eq!(result.per_category.len(), Category::SCORED.len());
        for report in result.per_category.values() {
            prop_assert!(report.score <= 100);
        }
        prop_assert!(result.recommendations.len() <= MAX_RECOMMENDATIONS);
    }

    #[test]
    fn aggregation_is_deterministic(findings in prop::collection::vec(arb_finding(), 0..30)) {
        prop_assert_eq!(aggregate(&findings), aggregate(&findings));
    }

    #[test]
    fn untriggered_findings_change_nothing(
        findings in prop::collection::vec(arb_finding(), 0..20),
        extra in prop::collection::vec(arb_finding(), 0..20),
    ) {
        let mut padded = findings.clone();
        padded.extend(extra.into_iter().map(|mut f| { f.triggered = false; f }));
        prop_assert_eq!(aggregate(&findings), aggregate(&padded));
    }
}

#[test]
fn clean_findings_score_one_hundred() {
    let findings: Vec<_> = Category::ALL.iter().map(|c| finding(*c, "quiet", false)).collect();
    let result = aggregate(&findings);
    assert_eq!(result.score, 100);
    assert!(result.strengths.is_empty());
    assert!(result.recommendations.is_empty());
    for category in Category::SCORED {
        assert_eq!(result.category(category).score, 100);
    }
}

#[test]
fn category_scores_follow_issue_counts() {
    assert_eq!(category_score(Category::Security, 1), 88);
    assert_eq!(category_score(Category::Security, 9), 0);
    assert_eq!(category_score(Category::Memory, 3), 70);
    assert_eq!(category_score(Category::Battery, 11), 0);
}

#[test]
fn strengths_offset_issues_up_to_the_cap() {
    let findings = vec![
        finding(Category::Strength, "tests", true),
        finding(Category::Strength, "docs", true),
        finding(Category::Security, "eval", true),
        finding(Category::Memory, "leak", true),
    ];
    // 100 + 8 - 8 - 7
    assert_eq!(composite_score(&findings), 93);
}

#[test]
fn recommendations_rank_security_first_and_keep_table_order_within_a_tier() {
    let findings = vec![
        finding(Category::Weakness, "long functions", true),
        finding(Category::Battery, "timers", true),
        finding(Category::Memory, "listeners", true),
        finding(Category::Security, "eval", true),
        finding(Category::Strength, "tests", true),
    ];
    assert_eq!(
        recommendations(&findings),
        vec![
            "To improve security: address eval".to_string(),
            "To improve battery life: address timers".to_string(),
            "To reduce memory usage: address listeners".to_string(),
            "Improve: long functions".to_string(),
        ]
    );
}

#[test]
fn recommendations_are_capped() {
    let findings: Vec<_> =
        (0..25).map(|i| finding(Category::Performance, &format!("hot path {i}"), true)).collect();
    let recs = recommendations(&findings);
    assert_eq!(recs.len(), MAX_RECOMMENDATIONS);
    assert_eq!(recs[0], "To improve performance: address hot path 0");
}

#[test]
fn weaknesses_and_strengths_are_listed_verbatim() {
    let findings = vec![
        finding(Category::Strength, "Implements automated tests", true),
        finding(Category::Weakness, "Insufficient comments", true),
        finding(Category::Weakness, "Mixed indentation", false),
    ];
    let result = aggregate(&findings);
    assert_eq!(result.strengths, vec!["Implements automated tests".to_string()]);
    assert_eq!(result.weaknesses, vec!["Insufficient comments".to_string()]);
    // Weaknesses lower the composite but have no sub-score.
    assert_eq!(result.score, 99);
    assert_eq!(result.issue_count(), 1);
}
