// src/taxonomy/code.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static SOC_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}-\d{4}$").expect("static regex"));

/// A Standard Occupational Classification code, `XX-XXXX`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SocCode(String);

impl SocCode {
    /// Normalize dash variants and surrounding whitespace, then validate.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = normalize_code(raw);
        if SOC_CODE.is_match(&normalized) {
            Some(SocCode(normalized))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Group summaries (`XX-0000`, `XX-X000` …) end in `0000` at the major level.
    pub fn is_summary(&self) -> bool {
        self.0.ends_with("0000")
    }
}

/// Replace en/em dashes, minus signs and stray spaces inside a code.
pub fn normalize_code(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' | '\u{fe58}' | '\u{fe63}' | '\u{ff0d}' => '-',
            other => other,
        })
        .collect()
}

impl fmt::Display for SocCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SocCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SocCode::parse(&value).ok_or_else(|| format!("`{}` is not a SOC code", value))
    }
}

impl From<SocCode> for String {
    fn from(c: SocCode) -> String {
        c.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validator_accepts_and_rejects() {
        assert!(SocCode::parse("15-2011").is_some());
        assert!(SocCode::parse("152011").is_none());
        assert!(SocCode::parse("AB-1234").is_none());
        assert!(SocCode::parse("15-20111").is_none());
        assert!(SocCode::parse("").is_none());
    }

    #[test]
    fn dash_variants_normalize() {
        assert_eq!(SocCode::parse("15\u{2013}2011").unwrap().as_str(), "15-2011");
        assert_eq!(SocCode::parse(" 15\u{2014}2011 ").unwrap().as_str(), "15-2011");
        assert_eq!(SocCode::parse("15 - 2011").unwrap().as_str(), "15-2011");
    }

    #[test]
    fn summary_codes() {
        let c = SocCode::parse("15-2011").unwrap();
        assert!(!c.is_summary());
        assert!(SocCode::parse("15-0000").unwrap().is_summary());
    }
}
