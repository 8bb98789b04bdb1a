//! Shared data model for the procdesc experiment pipeline.
//!
//! Every stage (annotate → generate → score import / basic eval → flatten)
//! is a separate batch pass that hands data to the next one through files.
//! This crate owns the shapes of those files, the identifier that joins them,
//! and the model catalog the stages price against.

pub mod catalog;
pub mod error;
pub mod layout;
pub mod records;
pub mod score;
pub mod uid;

pub use catalog::{ModelCatalog, ModelSpec};
pub use error::{require_existing, ExperimentError, Result};
pub use layout::ResultsDir;
pub use records::{
    BasicEvaluation, DiagramAnnotation, GenerationResult, Parameters, Prompt, Testcase,
    TokenUsage, TypeCounts, GENERATION_SEED,
};
pub use score::{ScoreFragment, ScoreSheet};
pub use uid::TestcaseUid;
