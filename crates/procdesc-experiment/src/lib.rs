//! Experiment stages for procdesc
//!
//! - [`expand`]: metadata document to the testcase cross product
//! - [`generate`]: one generation call and one artifact directory per testcase
//! - [`evaluate`]: sentence and word counts per description
//! - [`scores`]: scoring-tool CSV sheets to per-testcase JSON fragments
//! - [`flatten`]: all per-testcase artifacts to `final_results.csv`
//!
//! Stages communicate only through the results tree on disk, so each one can
//! be rerun on its own.

pub mod evaluate;
pub mod expand;
pub mod flatten;
pub mod generate;
pub mod scores;

pub use evaluate::{BasicEvaluator, RuleBasedSegmenter, TextSegmenter};
pub use expand::{cross_product, expand, expand_metadata, ExperimentMetadata};
pub use flatten::{flatten, flatten_results, FlatRecord, FlatValue};
pub use generate::GenerationRunner;
pub use scores::ScoreImporter;
