//! Rule evaluation over a corpus.
//!
//! Everything here is a pure function of its inputs: the same corpus and rule
//! always produce the same [`Evaluation`].

use crate::corpus::Corpus;
use crate::model::Finding;
use crate::rules::heuristics;
use crate::rules::{PatternSet, Rule, Signal};

/// Raw outcome of evaluating a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    pub occurrence_count: usize,
    pub satisfied: bool,
}

impl Evaluation {
    pub fn new(occurrence_count: usize, satisfied: bool) -> Self {
        Self { occurrence_count, satisfied }
    }
}

/// Total non-overlapping include matches across every eligible file.
///
/// A file in which any exclude pattern matches contributes nothing.
pub fn count_matches(corpus: &Corpus, set: &PatternSet) -> usize {
    corpus
        .files
        .iter()
        .filter(|file| set.files.matches(file))
        .filter(|file| !set.exclude.iter().any(|re| re.is_match(&file.content)))
        .map(|file| set.include.iter().map(|re| re.find_iter(&file.content).count()).sum::<usize>())
        .sum()
}

/// Evaluate a rule's signal.
///
/// A rule never fires on a corpus with no loaded files, including rules that
/// only look at the tree listing.
pub fn evaluate(corpus: &Corpus, rule: &Rule) -> Evaluation {
    if corpus.files.is_empty() {
        return Evaluation::default();
    }
    evaluate_signal(corpus, &rule.signal)
}

/// Evaluate a signal tree.
pub fn evaluate_signal(corpus: &Corpus, signal: &Signal) -> Evaluation {
    match signal {
        Signal::Patterns(set) => {
            let count = count_matches(corpus, set);
            Evaluation::new(count, set.is_satisfied(count))
        }
        Signal::AllOf(children) => {
            let mut total = 0usize;
            for child in children {
                let eval = evaluate_signal(corpus, child);
                if !eval.satisfied {
                    return Evaluation::new(0, false);
                }
                total += eval.occurrence_count;
            }
            Evaluation::new(total, !children.is_empty())
        }
        Signal::AnyOf(children) => {
            let mut total = 0usize;
            let mut satisfied = false;
            for child in children {
                let eval = evaluate_signal(corpus, child);
                if eval.satisfied {
                    satisfied = true;
                    total += eval.occurrence_count;
                }
            }
            Evaluation::new(total, satisfied)
        }
        Signal::Absent(inner) => {
            let eval = evaluate_signal(corpus, inner);
            Evaluation::new(0, !eval.satisfied)
        }
        Signal::Heuristic(h) => heuristics::evaluate(corpus, h),
    }
}

/// Evaluate a rule and wrap the outcome as a [`Finding`].
pub fn finding(corpus: &Corpus, rule: &Rule) -> Finding {
    let eval = evaluate(corpus, rule);
    Finding {
        rule_id: rule.id.clone(),
        category: rule.category,
        message: rule.message.clone(),
        weight: rule.weight,
        triggered: eval.satisfied,
        occurrence_count: eval.occurrence_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileRecord;
    use crate::rules::FileFilter;
    use regex::Regex;

    fn file(name: &str, content: &str) -> FileRecord {
        let extension = name.rsplit('.').next().unwrap_or_default().to_string();
        FileRecord {
            path: format!("/repo/{name}").into(),
            name: name.to_string(),
            extension,
            content: content.to_string(),
        }
    }

    fn set(include: &[&str], exclude: &[&str], min: usize) -> PatternSet {
        PatternSet {
            include: include.iter().map(|p| Regex::new(p).unwrap()).collect(),
            exclude: exclude.iter().map(|p| Regex::new(p).unwrap()).collect(),
            min_occurrences: min,
            files: FileFilter::default(),
        }
    }

    #[test]
    fn absent_of_empty_all_of_is_satisfied() {
        let corpus = Corpus::default();
        let eval = evaluate_signal(&corpus, &Signal::Absent(Box::new(Signal::AllOf(vec![]))));
        assert!(eval.satisfied);
    }

    #[test]
    fn any_of_sums_only_satisfied_children() {
        let corpus = Corpus::from_files("/repo", vec![file("a.js", "foo foo bar")]);
        let signal = Signal::AnyOf(vec![
            Signal::Patterns(set(&["foo"], &[], 0)),
            Signal::Patterns(set(&["bar"], &[], 5)),
        ]);
        assert_eq!(evaluate_signal(&corpus, &signal), Evaluation::new(2, true));
    }
}
