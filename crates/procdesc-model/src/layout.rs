//! On-disk layout of datasets and results.
//!
//! ```text
//! <dataset_dir>/<diagram>/<name>.bpmn
//! <dataset_dir>/<diagram>/annotated_model.json
//! <results>/<dataset>/<uid>/{generation_result.json, generated_description.txt, ...}
//! <results>/<dataset>/descriptions/desc_<uid>.txt
//! <results>/<dataset>/final_results.csv
//! ```

use crate::error::{ExperimentError, Result};
use crate::uid::TestcaseUid;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const ANNOTATION_FILE: &str = "annotated_model.json";
pub const GENERATION_RESULT_FILE: &str = "generation_result.json";
pub const DESCRIPTION_FILE: &str = "generated_description.txt";
pub const PARAMETERS_FILE: &str = "parameters.json";
pub const BASIC_EVAL_FILE: &str = "basic_eval.json";
pub const DESCRIPTIONS_DIR: &str = "descriptions";
pub const FINAL_RESULTS_FILE: &str = "final_results.csv";
pub const DEFAULT_RESULTS_ROOT: &str = "results";

/// Immediate sub-directories of `dir`, sorted by name.
pub fn sub_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
            ExperimentError::io(path, source)
        })?;
        if entry.file_type().is_dir() {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// One dataset's results directory (`<results>/<dataset>`).
#[derive(Debug, Clone)]
pub struct ResultsDir {
    root: PathBuf,
}

impl ResultsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<results_root>/<dataset_name>`
    pub fn for_dataset(results_root: &Path, dataset_name: &str) -> Self {
        Self::new(results_root.join(dataset_name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn testcase_dir(&self, uid: &TestcaseUid) -> PathBuf {
        self.root.join(uid.as_str())
    }

    pub fn descriptions_dir(&self) -> PathBuf {
        self.root.join(DESCRIPTIONS_DIR)
    }

    pub fn pooled_description(&self, uid: &TestcaseUid) -> PathBuf {
        self.descriptions_dir().join(format!("desc_{uid}.txt"))
    }

    pub fn final_results(&self) -> PathBuf {
        self.root.join(FINAL_RESULTS_FILE)
    }

    /// Every testcase directory (all sub-directories except the descriptions pool),
    /// sorted by uid.
    pub fn testcases(&self) -> Result<Vec<(TestcaseUid, PathBuf)>> {
        let mut out = Vec::new();
        for dir in sub_dirs(&self.root)? {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name == DESCRIPTIONS_DIR {
                continue;
            }
            out.push((TestcaseUid::parse(&name)?, dir));
        }
        Ok(out)
    }
}

/// Read a JSON artifact; a missing file is `MissingArtifact`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| ExperimentError::json(path, e))
}

/// Read a text artifact; a missing file is `MissingArtifact`.
pub fn read_text(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(ExperimentError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|e| ExperimentError::io(path, e))
}

/// Write `value` as 4-space indented JSON, replacing any existing file.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut ser)
        .map_err(|e| ExperimentError::json(path, e))?;
    fs::write(path, buf).map_err(|e| ExperimentError::io(path, e))?;
    tracing::debug!(path = %path.display(), "wrote json artifact");
    Ok(())
}

pub fn write_text(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|e| ExperimentError::io(path, e))
}

/// Create `dir` and its parents if absent.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| ExperimentError::io(dir, e))
}
