//! Pipeline services: fetching, classification, analysis, aggregation.

pub mod aggregate;
pub mod analysis;
pub mod classify;
pub mod fetch;

pub use aggregate::aggregate;
pub use analysis::{AnalysisError, AnalysisOutcome, Analyzer, AnalyzerOptions};
pub use classify::{FileTreeClassifier, VariantClassifier};
pub use fetch::{
    Checkout, FetchError, GitFetcher, LocalFetcher, RepoRef, RoutingFetcher, SourceFetcher,
};
