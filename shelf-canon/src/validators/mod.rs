//! Data quality validators

pub mod completeness_scorer;

pub use completeness_scorer::{score, score_book, CompletenessScore, Severity};
