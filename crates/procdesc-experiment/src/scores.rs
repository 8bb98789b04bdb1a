//! Import of the external scoring tool's CSV sheets into per-testcase JSON fragments.
//!
//! The tool reads `descriptions/desc_<uid>.txt` and writes three sheets back
//! into the same folder. Each sheet has a `filename` column naming the
//! description it scored; every other column is a numeric metric.

use procdesc_model::layout;
use procdesc_model::{ExperimentError, Result, ResultsDir, ScoreFragment, ScoreSheet, TestcaseUid};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

pub const FILENAME_COLUMN: &str = "filename";

fn desc_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"desc_(\w+)\.txt").expect("static regex"))
}

/// Testcase uid encoded in a sheet's `filename` cell.
///
/// The overall sheet lists bare names (`desc_<uid>.txt`): the uid is the part
/// after the first `_` of the name before its first `.`. The other two sheets
/// list full paths, matched against `desc_<uid>.txt`.
pub fn uid_from_filename(sheet: ScoreSheet, filename: &str) -> Option<String> {
    match sheet {
        ScoreSheet::Overall => {
            let stem = filename.split('.').next()?;
            stem.split('_').nth(1).map(str::to_string)
        }
        ScoreSheet::SubComponentAlignment | ScoreSheet::Components => desc_file_pattern()
            .captures(filename)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
    }
}

/// Parse one sheet into uid -> fragment. Rows for the same uid merge; a later
/// value for the same metric replaces the earlier one.
pub fn read_sheet(sheet: ScoreSheet, path: &Path) -> Result<BTreeMap<TestcaseUid, ScoreFragment>> {
    if !path.is_file() {
        return Err(ExperimentError::MissingScoreFile {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path).map_err(|e| ExperimentError::csv(path, e))?;
    let headers = reader
        .headers()
        .map_err(|e| ExperimentError::csv(path, e))?
        .clone();
    let filename_at = headers
        .iter()
        .position(|h| h == FILENAME_COLUMN)
        .ok_or_else(|| ExperimentError::csv(path, "no `filename` column"))?;

    let mut out: BTreeMap<TestcaseUid, ScoreFragment> = BTreeMap::new();
    for (n, record) in reader.records().enumerate() {
        let row = n + 1;
        let record = record.map_err(|e| ExperimentError::csv(path, e))?;
        let row_error = |message: String| ExperimentError::ScoreRow {
            path: path.to_path_buf(),
            row,
            message,
        };

        let filename = record.get(filename_at).unwrap_or_default();
        let uid = uid_from_filename(sheet, filename)
            .ok_or_else(|| row_error(format!("no testcase id in filename `{filename}`")))?;
        let uid = TestcaseUid::parse(&uid)?;

        if out.contains_key(&uid) {
            tracing::warn!(uid = %uid, sheet = sheet.csv_file_name(), row, "duplicate score row, later values win");
        }
        let fragment = out.entry(uid).or_default();
        for (column, value) in headers.iter().zip(record.iter()) {
            if column == FILENAME_COLUMN {
                continue;
            }
            let parsed: f64 = value
                .trim()
                .parse()
                .map_err(|_| row_error(format!("column `{column}`: `{value}` is not a number")))?;
            fragment.insert(column, parsed);
        }
    }
    Ok(out)
}

/// Reads the three sheets from the descriptions pool and writes one JSON
/// fragment per testcase per sheet.
pub struct ScoreImporter;

impl ScoreImporter {
    pub fn import(results: &ResultsDir) -> Result<BTreeMap<ScoreSheet, usize>> {
        let pool = results.descriptions_dir();
        // All three sheets must be present before anything is written.
        for sheet in ScoreSheet::ALL {
            let path = pool.join(sheet.csv_file_name());
            if !path.is_file() {
                return Err(ExperimentError::MissingScoreFile { path });
            }
        }

        let mut written = BTreeMap::new();
        for sheet in ScoreSheet::ALL {
            let fragments = read_sheet(sheet, &pool.join(sheet.csv_file_name()))?;
            for (uid, fragment) in &fragments {
                let dir = results.testcase_dir(uid);
                if !dir.is_dir() {
                    return Err(ExperimentError::UnknownTestcase {
                        uid: uid.to_string(),
                        dir,
                    });
                }
                layout::write_json_pretty(&dir.join(sheet.json_file_name()), fragment)?;
            }
            tracing::info!(sheet = sheet.csv_file_name(), testcases = fragments.len(), "imported scores");
            written.insert(sheet, fragments.len());
        }
        Ok(written)
    }
}
