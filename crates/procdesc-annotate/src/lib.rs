//! Diagram annotation for procdesc
//!
//! Walks a dataset directory (`<dataset>/<diagram>/<name>.bpmn`) and writes
//! one `annotated_model.json` next to every diagram:
//! - structural counts and complexity metrics from the BPMN markup
//! - token and character counts of the serialized diagram
//! - the catalog models whose context window fits, with input cost estimates

use procdesc_model::layout::{self, ANNOTATION_FILE};
use procdesc_model::{DiagramAnnotation, ExperimentError, ModelCatalog, Result};
use std::path::Path;

pub mod metrics;
pub mod tokens;

pub use metrics::{DiagramMetrics, MetricsError};
pub use tokens::{Gpt2TokenCounter, TokenCounter, TokenizerError};

pub const DIAGRAM_EXTENSION: &str = "bpmn";

/// Annotates diagrams against an injected catalog and tokenizer.
pub struct Annotator<T: TokenCounter> {
    catalog: ModelCatalog,
    tokenizer: T,
}

impl<T: TokenCounter> Annotator<T> {
    pub fn new(catalog: ModelCatalog, tokenizer: T) -> Self {
        Self { catalog, tokenizer }
    }

    /// Annotate every diagram directory under `dataset_dir`, overwriting any
    /// previous `annotated_model.json`.
    pub fn annotate_dataset(&self, dataset_dir: &Path) -> Result<Vec<DiagramAnnotation>> {
        tracing::info!(dataset = %dataset_dir.display(), "annotating dataset");
        let mut out = Vec::new();
        for dir in layout::sub_dirs(dataset_dir)? {
            let annotation = self.annotate_dir(&dir)?;
            layout::write_json_pretty(&dir.join(ANNOTATION_FILE), &annotation)?;
            tracing::info!(
                model_id = %annotation.model_id,
                tokens = annotation.tokens_count,
                supported = annotation.supported_chatgpt_models.len(),
                "annotated diagram"
            );
            out.push(annotation);
        }
        Ok(out)
    }

    /// Annotate the single diagram in `dir` without writing anything.
    pub fn annotate_dir(&self, dir: &Path) -> Result<DiagramAnnotation> {
        let diagram = find_diagram(dir)?;
        let text = layout::read_text(&diagram)?;
        self.annotate_text(&text, dir)
            .map_err(|e| match e {
                ExperimentError::InvalidDiagram { message, .. } => ExperimentError::InvalidDiagram {
                    path: diagram.clone(),
                    message,
                },
                other => other,
            })
    }

    /// Annotate serialized diagram markup; `dir` is recorded as the source directory.
    pub fn annotate_text(&self, serialized_model: &str, dir: &Path) -> Result<DiagramAnnotation> {
        let m = DiagramMetrics::from_xml(serialized_model).map_err(|e| {
            ExperimentError::InvalidDiagram {
                path: dir.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        let tokens_count = self.tokenizer.count(serialized_model);
        let supported_chatgpt_models = self
            .catalog
            .supported_models(tokens_count)
            .into_iter()
            .map(|spec| spec.id.clone())
            .collect();

        Ok(DiagramAnnotation {
            model_id: m.model_id,
            serialized_model: serialized_model.to_string(),
            activities_count: m.activities_count,
            events_count: m.events_count,
            gateways_count: m.gateways_count,
            type_activities_count: m.type_activities_count,
            type_events_count: m.type_events_count,
            type_gateways_count: m.type_gateways_count,
            cnc: m.cnc,
            durfee: m.durfee,
            nodes_count: m.nodes_count,
            sequence_flows_count: m.sequence_flows_count,
            pools_count: m.pools_count,
            lanes_count: m.lanes_count,
            tokens_count,
            characters_count: serialized_model.chars().count(),
            supported_chatgpt_models,
            chatgpt_model_pricings_usd: self.catalog.input_cost_table(tokens_count),
            dir: dir.to_path_buf(),
        })
    }
}

/// The one `.bpmn` file directly inside `dir`.
pub fn find_diagram(dir: &Path) -> Result<std::path::PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| ExperimentError::io(dir, e))?;
    let mut found = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ExperimentError::io(dir, e))?.path();
        let is_diagram = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext == DIAGRAM_EXTENSION);
        if is_diagram {
            found.push(path);
        }
    }
    if found.len() != 1 {
        return Err(ExperimentError::MalformedDataset {
            dir: dir.to_path_buf(),
            found: found.len(),
        });
    }
    Ok(found.remove(0))
}
