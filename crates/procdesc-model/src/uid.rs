//! Testcase identifiers.
//!
//! A `TestcaseUid` is the join key of the whole pipeline: it names the
//! per-testcase results directory, the pooled `desc_<uid>.txt` file, and the
//! rows the scoring tool writes back.

use crate::error::{ExperimentError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TestcaseUid(String);

impl TestcaseUid {
    /// Mint a fresh, time-ordered identifier (UUIDv7, 32 lowercase hex chars).
    pub fn mint() -> Self {
        Self(Uuid::now_v7().simple().to_string())
    }

    /// Accept an identifier read back from disk or from a score sheet.
    ///
    /// Identifiers are word tokens (`[A-Za-z0-9_]+`), the same shape the
    /// scoring tool's file names are matched against.
    pub fn parse(value: &str) -> Result<Self> {
        let ok = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if ok {
            Ok(Self(value.to_string()))
        } else {
            Err(ExperimentError::InvalidUid {
                value: value.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestcaseUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TestcaseUid {
    type Err = ExperimentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TestcaseUid {
    type Error = ExperimentError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TestcaseUid> for String {
    fn from(uid: TestcaseUid) -> Self {
        uid.0
    }
}
