//! Testcase expansion: diagrams x prompts x temperatures x models.

use procdesc_model::layout::{self, ANNOTATION_FILE};
use procdesc_model::{DiagramAnnotation, ExperimentError, Prompt, Result, Testcase};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const PROMPT_EXTENSION: &str = "txt";

/// Experiment metadata document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentMetadata {
    pub chatgpt_models: Vec<String>,
    pub temperatures: Vec<f64>,
    pub annotated_dataset_dir: PathBuf,
    pub prompts_dir: PathBuf,
}

impl ExperimentMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ExperimentError::MetadataNotFound {
                path: path.to_path_buf(),
            });
        }
        layout::read_json(path)
    }

    /// Last path component of the annotated dataset directory.
    ///
    /// The name becomes a directory under the results root, so `.`, `..`,
    /// a bare root and an empty path are rejected.
    pub fn dataset_name(&self) -> Result<String> {
        match self.annotated_dataset_dir.components().next_back() {
            Some(Component::Normal(name)) => Ok(name.to_string_lossy().into_owned()),
            _ => Err(ExperimentError::InvalidDatasetName {
                path: self.annotated_dataset_dir.clone(),
            }),
        }
    }
}

/// Every `annotated_model.json` under the dataset, one per sub-directory, by directory name.
pub fn load_annotations(dataset_dir: &Path) -> Result<Vec<DiagramAnnotation>> {
    layout::sub_dirs(dataset_dir)?
        .iter()
        .map(|dir| layout::read_json(&dir.join(ANNOTATION_FILE)))
        .collect()
}

/// Every `.txt` prompt in `prompts_dir`, by file name.
pub fn load_prompts(prompts_dir: &Path) -> Result<Vec<Prompt>> {
    let entries = std::fs::read_dir(prompts_dir).map_err(|e| ExperimentError::io(prompts_dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ExperimentError::io(prompts_dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == PROMPT_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let text = layout::read_text(&path)?;
            Ok(Prompt { name, text })
        })
        .collect()
}

/// Cross product in diagram, prompt, temperature, model order.
pub fn cross_product(
    dataset_name: &str,
    annotations: &[DiagramAnnotation],
    prompts: &[Prompt],
    temperatures: &[f64],
    models: &[String],
) -> Vec<Testcase> {
    let mut out =
        Vec::with_capacity(annotations.len() * prompts.len() * temperatures.len() * models.len());
    for annotation in annotations {
        for prompt in prompts {
            for &temperature in temperatures {
                for model in models {
                    out.push(Testcase {
                        dataset_name: dataset_name.to_string(),
                        annotation: annotation.clone(),
                        prompt: prompt.clone(),
                        temperature,
                        chatgpt_model: model.clone(),
                    });
                }
            }
        }
    }
    out
}

/// Load the metadata at `path` and expand it into testcases.
pub fn expand(path: &Path) -> Result<Vec<Testcase>> {
    let metadata = ExperimentMetadata::load(path)?;
    expand_metadata(&metadata)
}

pub fn expand_metadata(metadata: &ExperimentMetadata) -> Result<Vec<Testcase>> {
    let dataset_name = metadata.dataset_name()?;
    let annotations = load_annotations(&metadata.annotated_dataset_dir)?;
    let prompts = load_prompts(&metadata.prompts_dir)?;
    let testcases = cross_product(
        &dataset_name,
        &annotations,
        &prompts,
        &metadata.temperatures,
        &metadata.chatgpt_models,
    );
    tracing::info!(
        diagrams = annotations.len(),
        prompts = prompts.len(),
        temperatures = metadata.temperatures.len(),
        models = metadata.chatgpt_models.len(),
        testcases = testcases.len(),
        "expanded experiment"
    );
    Ok(testcases)
}
