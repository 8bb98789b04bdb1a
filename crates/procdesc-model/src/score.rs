//! Scoring-tool (TAASC) sheets and the per-testcase fragments imported from them.

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The three CSV sheets the scoring tool writes into the descriptions pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScoreSheet {
    /// Overall scores (`taasc_results.csv`).
    Overall,
    /// Sub-component alignment (`taasc_results_sca.csv`).
    SubComponentAlignment,
    /// Per-component scores (`taasc_results_components.csv`).
    Components,
}

impl ScoreSheet {
    pub const ALL: [ScoreSheet; 3] = [
        ScoreSheet::Overall,
        ScoreSheet::SubComponentAlignment,
        ScoreSheet::Components,
    ];

    pub fn csv_file_name(self) -> &'static str {
        match self {
            Self::Overall => "taasc_results.csv",
            Self::SubComponentAlignment => "taasc_results_sca.csv",
            Self::Components => "taasc_results_components.csv",
        }
    }

    pub fn json_file_name(self) -> &'static str {
        match self {
            Self::Overall => "taasc_results.json",
            Self::SubComponentAlignment => "taasc_results_sca.json",
            Self::Components => "taasc_results_components.json",
        }
    }

    /// Column prefix in the flattened table.
    pub fn column_prefix(self) -> &'static str {
        match self {
            Self::Overall => "taasc_",
            Self::SubComponentAlignment => "taasc_sca_",
            Self::Components => "taasc_components_",
        }
    }
}

/// Metric name -> value, in the sheet's column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreFragment {
    entries: Vec<(String, f64)>,
}

impl ScoreFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metric; an existing metric keeps its position and takes the new value.
    pub fn insert(&mut self, metric: impl Into<String>, value: f64) {
        let metric = metric.into();
        match self.entries.iter_mut().find(|(k, _)| *k == metric) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((metric, value)),
        }
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(k, _)| k == metric)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// JSON has no literal for non-finite numbers; they are stored as these tokens.
const NAN_TOKEN: &str = "NaN";
const INFINITY_TOKEN: &str = "Infinity";
const NEG_INFINITY_TOKEN: &str = "-Infinity";

fn non_finite_token(v: f64) -> Option<&'static str> {
    if v.is_nan() {
        Some(NAN_TOKEN)
    } else if v == f64::INFINITY {
        Some(INFINITY_TOKEN)
    } else if v == f64::NEG_INFINITY {
        Some(NEG_INFINITY_TOKEN)
    } else {
        None
    }
}

/// A metric value: a JSON number or one of the non-finite tokens.
struct MetricValue(f64);

impl<'de> Deserialize<'de> for MetricValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MetricVisitor;

        impl<'de> Visitor<'de> for MetricVisitor {
            type Value = MetricValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number, \"NaN\", \"Infinity\" or \"-Infinity\"")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(MetricValue(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(MetricValue(v as f64))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(MetricValue(v as f64))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                match v {
                    NAN_TOKEN => Ok(MetricValue(f64::NAN)),
                    INFINITY_TOKEN => Ok(MetricValue(f64::INFINITY)),
                    NEG_INFINITY_TOKEN => Ok(MetricValue(f64::NEG_INFINITY)),
                    _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
                }
            }
        }

        deserializer.deserialize_any(MetricVisitor)
    }
}

impl Serialize for ScoreFragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            match non_finite_token(*v) {
                Some(token) => map.serialize_entry(k, token)?,
                None => map.serialize_entry(k, v)?,
            }
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScoreFragment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FragmentVisitor;

        impl<'de> Visitor<'de> for FragmentVisitor {
            type Value = ScoreFragment;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of metric names to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut fragment = ScoreFragment::new();
                while let Some((k, MetricValue(v))) = access.next_entry::<String, MetricValue>()? {
                    fragment.insert(k, v);
                }
                Ok(fragment)
            }
        }

        deserializer.deserialize_map(FragmentVisitor)
    }
}
