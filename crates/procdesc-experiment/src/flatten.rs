//! Result flattening: every testcase's artifacts joined into one CSV row.
//!
//! Column groups, in order:
//! - `uid`, `dataset`, `model_id`, `chatgpt_model`, `temperature`, `prompt_name`, `seed`
//! - basic evaluation (`sent_count`, `word_count`)
//! - `md_*` annotation fields, per-type maps expanded after the scalars
//! - `genres_*` generation fields (without the text itself)
//! - `taasc_*`, `taasc_sca_*`, `taasc_components_*` score fragments
//!
//! Every record is assembled before the CSV is opened, so a missing artifact
//! or an inconsistent header leaves no output file behind.

use procdesc_model::layout::{
    self, ANNOTATION_FILE, BASIC_EVAL_FILE, GENERATION_RESULT_FILE, PARAMETERS_FILE,
};
use procdesc_model::{
    BasicEvaluation, DiagramAnnotation, ExperimentError, GenerationResult, Parameters, Result,
    ResultsDir, ScoreFragment, ScoreSheet, TestcaseUid, TypeCounts,
};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

pub const ANNOTATION_PREFIX: &str = "md_";
pub const GENERATION_PREFIX: &str = "genres_";

#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    Int(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FlatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => f.write_str(&format_float(*x)),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<usize> for FlatValue {
    fn from(n: usize) -> Self {
        Self::Int(n as u64)
    }
}

impl From<u64> for FlatValue {
    fn from(n: u64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for FlatValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for FlatValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FlatValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Render a float with a fractional part always present (`1.0`, `0.25`).
///
/// Decimal exponents below -4 or from 16 up switch to scientific notation
/// with a signed, two-digit exponent (`1e-05`, `1.5e+20`).
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let sci = format!("{x:e}");
    if let Some((mantissa, exp)) = sci.split_once('e') {
        if let Ok(exp) = exp.parse::<i32>() {
            if !(-4..16).contains(&exp) {
                let sign = if exp < 0 { '-' } else { '+' };
                return format!("{mantissa}e{sign}{:02}", exp.unsigned_abs());
            }
        }
    }
    let s = x.to_string();
    if s.contains(|c: char| matches!(c, '.' | 'e' | 'E')) {
        s
    } else {
        format!("{s}.0")
    }
}

/// One testcase's flattened row, columns in output order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord {
    uid: TestcaseUid,
    columns: Vec<(String, FlatValue)>,
    seen: HashSet<String>,
}

impl FlatRecord {
    pub fn new(uid: TestcaseUid) -> Self {
        Self {
            uid,
            columns: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn uid(&self) -> &TestcaseUid {
        &self.uid
    }

    /// Append a column; a name already present in this record is an error.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<FlatValue>) -> Result<()> {
        let column = column.into();
        if !self.seen.insert(column.clone()) {
            return Err(ExperimentError::DuplicateColumn {
                uid: self.uid.to_string(),
                column,
            });
        }
        self.columns.push((column, value.into()));
        Ok(())
    }

    pub fn header(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(c, _)| c.as_str())
    }

    pub fn get(&self, column: &str) -> Option<&FlatValue> {
        self.columns
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v)
    }

    pub fn values(&self) -> impl Iterator<Item = &FlatValue> {
        self.columns.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn same_header(&self, other: &FlatRecord) -> bool {
        self.header().eq(other.header())
    }
}

fn push_type_counts(record: &mut FlatRecord, group: &str, counts: &TypeCounts) -> Result<()> {
    for (subtype, n) in counts {
        record.push(format!("{ANNOTATION_PREFIX}{group}_{subtype}"), *n)?;
    }
    Ok(())
}

/// Join the artifacts in one testcase directory into a record.
pub fn flatten_testcase(uid: &TestcaseUid, dir: &Path) -> Result<FlatRecord> {
    let annotation: DiagramAnnotation = layout::read_json(&dir.join(ANNOTATION_FILE))?;
    let parameters: Parameters = layout::read_json(&dir.join(PARAMETERS_FILE))?;
    let generation: GenerationResult = layout::read_json(&dir.join(GENERATION_RESULT_FILE))?;
    let mut fragments = Vec::with_capacity(ScoreSheet::ALL.len());
    for sheet in ScoreSheet::ALL {
        let fragment: ScoreFragment = layout::read_json(&dir.join(sheet.json_file_name()))?;
        fragments.push((sheet, fragment));
    }
    let basic: BasicEvaluation = layout::read_json(&dir.join(BASIC_EVAL_FILE))?;

    let mut r = FlatRecord::new(uid.clone());
    r.push("uid", uid.as_str())?;
    r.push("dataset", parameters.dataset_name)?;
    r.push("model_id", parameters.model_id)?;
    r.push("chatgpt_model", parameters.chatgpt_model)?;
    r.push("temperature", parameters.temperature)?;
    r.push("prompt_name", parameters.prompt_name)?;
    r.push("seed", parameters.seed)?;

    r.push("sent_count", basic.sent_count)?;
    r.push("word_count", basic.word_count)?;

    let md = |field: &str| format!("{ANNOTATION_PREFIX}{field}");
    r.push(md("activities_count"), annotation.activities_count)?;
    r.push(md("events_count"), annotation.events_count)?;
    r.push(md("gateways_count"), annotation.gateways_count)?;
    r.push(md("cnc"), annotation.cnc)?;
    r.push(md("durfee"), annotation.durfee)?;
    r.push(md("nodes_count"), annotation.nodes_count)?;
    r.push(md("sequence_flows_count"), annotation.sequence_flows_count)?;
    r.push(md("pools_count"), annotation.pools_count)?;
    r.push(md("lanes_count"), annotation.lanes_count)?;
    r.push(md("tokens_count"), annotation.tokens_count)?;
    r.push(md("characters_count"), annotation.characters_count)?;
    r.push(md("dir"), annotation.dir.to_string_lossy().into_owned())?;
    push_type_counts(&mut r, "type_activities_count", &annotation.type_activities_count)?;
    push_type_counts(&mut r, "type_events_count", &annotation.type_events_count)?;
    push_type_counts(&mut r, "type_gateways_count", &annotation.type_gateways_count)?;

    let genres = |field: &str| format!("{GENERATION_PREFIX}{field}");
    r.push(genres("real_prompt_tokens"), generation.real_prompt_tokens)?;
    r.push(genres("real_completion_tokens"), generation.real_completion_tokens)?;
    r.push(genres("real_total_tokens"), generation.real_total_tokens)?;
    r.push(genres("billed_estimate"), generation.billed_estimate)?;

    for (sheet, fragment) in &fragments {
        for (metric, value) in fragment.iter() {
            r.push(format!("{}{metric}", sheet.column_prefix()), value)?;
        }
    }
    Ok(r)
}

/// Flatten every testcase under `results`, checking all share the first record's header.
pub fn flatten_results(results: &ResultsDir) -> Result<Vec<FlatRecord>> {
    let mut records: Vec<FlatRecord> = Vec::new();
    for (uid, dir) in results.testcases()? {
        tracing::debug!(uid = %uid, dir = %dir.display(), "flattening");
        let record = flatten_testcase(&uid, &dir)?;
        if let Some(first) = records.first() {
            if !first.same_header(&record) {
                return Err(ExperimentError::HeaderMismatch {
                    uid: uid.to_string(),
                    expected: first.len(),
                    actual: record.len(),
                });
            }
        }
        records.push(record);
    }
    if records.is_empty() {
        return Err(ExperimentError::EmptyResultSet {
            dir: results.root().to_path_buf(),
        });
    }
    Ok(records)
}

/// Write `records` (non-empty, uniform header) as a CSV file.
pub fn write_final_csv(path: &Path, records: &[FlatRecord]) -> Result<()> {
    let first = records.first().ok_or_else(|| ExperimentError::EmptyResultSet {
        dir: path.parent().unwrap_or(path).to_path_buf(),
    })?;
    let mut writer = csv::Writer::from_path(path).map_err(|e| ExperimentError::csv(path, e))?;
    writer
        .write_record(first.header())
        .map_err(|e| ExperimentError::csv(path, e))?;
    for record in records {
        writer
            .write_record(record.values().map(ToString::to_string))
            .map_err(|e| ExperimentError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ExperimentError::io(path, e))
}

/// Flatten a results directory into its `final_results.csv`; returns the row count.
pub fn flatten(results: &ResultsDir) -> Result<usize> {
    let records = flatten_results(results)?;
    let path = results.final_results();
    write_final_csv(&path, &records)?;
    tracing::info!(rows = records.len(), path = %path.display(), "wrote final results");
    Ok(records.len())
}
