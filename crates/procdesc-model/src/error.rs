//! Error taxonomy shared by every pipeline stage.
//!
//! Every error is fatal to the stage that raised it: no stage skips a broken
//! testcase and carries on.

use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T, E = ExperimentError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Reserved for library callers; the CLI never builds it because clap
    /// reports a missing positional argument as a usage error (exit code 2).
    #[error("{what} not specified")]
    MissingArgument { what: &'static str },

    #[error("path does not exist: {}", path.display())]
    PathNotFound { path: PathBuf },

    #[error(
        "malformed dataset: {} must contain exactly one .bpmn file (found {found})",
        dir.display()
    )]
    MalformedDataset { dir: PathBuf, found: usize },

    #[error("experiment metadata not found: {}", path.display())]
    MetadataNotFound { path: PathBuf },

    #[error("cannot derive a dataset name from {}", path.display())]
    InvalidDatasetName { path: PathBuf },

    #[error("missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("missing scoring-tool output: {}", path.display())]
    MissingScoreFile { path: PathBuf },

    #[error("text generation failed for model `{model}`: {message}")]
    ExternalService { model: String, message: String },

    #[error("model `{model}` is not in the model catalog")]
    UnknownModel { model: String },

    #[error("invalid diagram {}: {message}", path.display())]
    InvalidDiagram { path: PathBuf, message: String },

    #[error("invalid testcase identifier `{value}`")]
    InvalidUid { value: String },

    #[error("{}: row {row}: {message}", path.display())]
    ScoreRow {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("score row refers to testcase `{uid}` but {} does not exist", dir.display())]
    UnknownTestcase { uid: String, dir: PathBuf },

    #[error("no testcases found under {}", dir.display())]
    EmptyResultSet { dir: PathBuf },

    #[error(
        "testcase `{uid}` has columns that differ from the first record (expected {expected} columns, got {actual})"
    )]
    HeaderMismatch {
        uid: String,
        expected: usize,
        actual: usize,
    },

    #[error("testcase `{uid}` produced column `{column}` twice")]
    DuplicateColumn { uid: String, column: String },

    #[error("csv error in {}: {message}", path.display())]
    Csv { path: PathBuf, message: String },

    #[error("json error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExperimentError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn json(path: impl AsRef<Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn csv(path: impl AsRef<Path>, message: impl std::fmt::Display) -> Self {
        Self::Csv {
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Reject a CLI path argument that does not exist on disk.
pub fn require_existing(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ExperimentError::PathNotFound {
            path: path.to_path_buf(),
        })
    }
}
