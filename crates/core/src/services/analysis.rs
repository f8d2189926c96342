use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::corpus::{self, Corpus, LoadOptions};
use crate::model::{AnalysisResult, Finding, VariantTag};
use crate::rules::{engine, RuleError, RuleRegistry, VariantTable};
use crate::services::aggregate::aggregate;

/// Errors raised while setting up or running an analysis.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to build rule worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Rules(#[from] RuleError),
}

/// Tuning knobs for [`Analyzer`].
#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Upper bound on rules evaluated at once.
    pub rule_concurrency: usize,
    pub load: LoadOptions,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self { rule_concurrency: 4, load: LoadOptions::default() }
    }
}

/// Outcome of [`Analyzer::run`].
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// Tag of the table that was actually used.
    pub variant: VariantTag,
    pub files_loaded: usize,
    pub findings: Vec<Finding>,
    pub result: AnalysisResult,
}

/// Resolves a variant table and evaluates it against a corpus.
///
/// Rule fan-out runs on a dedicated rayon pool sized by `rule_concurrency`;
/// every rule sees the whole corpus and results come back in table order.
#[derive(Debug)]
pub struct Analyzer {
    registry: Arc<RuleRegistry>,
    pool: rayon::ThreadPool,
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(
        registry: Arc<RuleRegistry>,
        options: AnalyzerOptions,
    ) -> Result<Self, AnalysisError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.rule_concurrency.max(1))
            .thread_name(|i| format!("gauge-rules-{i}"))
            .build()?;
        Ok(Self { registry, pool, options })
    }

    /// Analyzer over the built-in tables with default options.
    pub fn builtin() -> Result<Self, AnalysisError> {
        Self::new(Arc::new(RuleRegistry::builtin()?), AnalyzerOptions::default())
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    /// Table that `tag` resolves to (the default table for unknown tags).
    pub fn table_for(&self, tag: &VariantTag) -> Arc<VariantTable> {
        self.registry.resolve(tag)
    }

    /// Load the files under `root` that the resolved table cares about.
    pub fn load(&self, root: &Path, tag: &VariantTag) -> Corpus {
        let table = self.table_for(tag);
        corpus::load_corpus_with(root, &table.extensions, &self.options.load)
    }

    /// One finding per rule of the resolved table, in table order.
    #[instrument(skip(self, corpus), fields(variant = %tag, files = corpus.files.len()))]
    pub fn analyze(&self, corpus: &Corpus, tag: &VariantTag) -> Vec<Finding> {
        let table = self.table_for(tag);
        let findings: Vec<Finding> = self.pool.install(|| {
            table.rules.par_iter().map(|rule| engine::finding(corpus, rule)).collect()
        });
        debug!(
            table = %table.tag,
            rules = findings.len(),
            triggered = findings.iter().filter(|f| f.triggered).count(),
            "rules evaluated"
        );
        findings
    }

    /// Load, analyze, and aggregate in one call.
    pub fn run(&self, root: &Path, tag: &VariantTag) -> AnalysisOutcome {
        let table = self.table_for(tag);
        let corpus = self.load(root, tag);
        let findings = self.analyze(&corpus, tag);
        let result = aggregate(&findings);
        AnalysisOutcome {
            variant: VariantTag::new(&table.tag),
            files_loaded: corpus.files.len(),
            findings,
            result,
        }
    }
}
