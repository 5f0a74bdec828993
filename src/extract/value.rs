// src/extract/value.rs

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};

use crate::workbook::Cell;

/// A numeric cell after coercion. Suppressed and unparseable inputs keep
/// their literal text so a reader can tell them from zero or a blank.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Measure {
    Value(f64),
    Suppressed(String),
    Unparseable(String),
    Missing,
}

impl Measure {
    pub fn value(&self) -> Option<f64> {
        match self {
            Measure::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Measure::Missing)
    }

    /// The marker persisted next to a NULL column, if any.
    pub fn flag(&self) -> Option<MeasureFlag> {
        match self {
            Measure::Suppressed(s) => Some(MeasureFlag::Suppressed(s.clone())),
            Measure::Unparseable(s) => Some(MeasureFlag::Unparseable(s.clone())),
            _ => None,
        }
    }

    /// Rebuild a measure from a stored column and its optional flag.
    pub fn from_stored(value: Option<f64>, flag: Option<&MeasureFlag>) -> Self {
        match (value, flag) {
            (Some(v), _) => Measure::Value(v),
            (None, Some(MeasureFlag::Suppressed(s))) => Measure::Suppressed(s.clone()),
            (None, Some(MeasureFlag::Unparseable(s))) => Measure::Unparseable(s.clone()),
            (None, None) => Measure::Missing,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            Measure::Value(v) => json!(v),
            Measure::Suppressed(s) => json!({ "suppressed": s }),
            Measure::Unparseable(s) => json!({ "unparseable": s }),
            Measure::Missing => Json::Null,
        }
    }
}

/// Persisted form of a non-numeric measure: `{"suppressed": "*"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureFlag {
    Suppressed(String),
    Unparseable(String),
}

/// Value of one extracted field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Numeric(Measure),
    Text(String),
}

impl FieldValue {
    pub fn measure(&self) -> Measure {
        match self {
            FieldValue::Numeric(m) => m.clone(),
            FieldValue::Text(_) => Measure::Missing,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Numeric(_) => None,
        }
    }

    pub fn to_json(&self) -> Json {
        match self {
            FieldValue::Numeric(m) => m.to_json(),
            FieldValue::Text(s) => json!(s),
        }
    }
}

/// Numeric coercion with a configurable set of suppression sentinels.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberParser {
    sentinels: Vec<String>,
}

impl Default for NumberParser {
    fn default() -> Self {
        Self::new(["*", "**", "***", "#"])
    }
}

impl NumberParser {
    pub fn new<I, S>(sentinels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sentinels: sentinels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_sentinel(&self, raw: &str) -> bool {
        let t = raw.trim();
        self.sentinels.iter().any(|s| s == t)
    }

    /// Coerce a cell into a measure.
    pub fn parse_cell(&self, cell: &Cell) -> Measure {
        match cell {
            Cell::Empty => Measure::Missing,
            Cell::Number(n) => Measure::Value(*n),
            Cell::Text(s) => self.parse_str(s),
        }
    }

    /// Strip separators, currency, percent signs and trailing footnote marks,
    /// then parse as a float.
    pub fn parse_str(&self, raw: &str) -> Measure {
        let t = raw.trim();
        if t.is_empty() {
            return Measure::Missing;
        }
        if self.is_sentinel(t) {
            return Measure::Suppressed(t.to_string());
        }

        let mut cleaned: String = t
            .chars()
            .filter(|c| !matches!(c, ',' | '$' | '%') && !c.is_whitespace())
            .map(|c| if c == '\u{2212}' { '-' } else { c })
            .collect();
        strip_footnote(&mut cleaned);
        let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

        match cleaned.parse::<f64>() {
            Ok(v) if v.is_finite() => Measure::Value(v),
            _ => Measure::Unparseable(t.to_string()),
        }
    }
}

/// `41.3(1)` → `41.3`.
fn strip_footnote(s: &mut String) {
    if s.ends_with(')') {
        if let Some(open) = s.rfind('(') {
            let inner = &s[open + 1..s.len() - 1];
            if open > 0 && !inner.is_empty() && inner.chars().all(|c| c.is_ascii_digit()) {
                s.truncate(open);
            }
        }
    }
}
