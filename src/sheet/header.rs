// src/sheet/header.rs

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::workbook::Sheet;

static OCCUPATION_VOCAB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(soc|code|occupation)").expect("static regex"));

static DATA_VOCAB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(employment|change|percent|openings|education|\b(1[89]|20)\d{2}\b)")
        .expect("static regex")
});

static FALLBACK_VOCAB: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(soc|code)\b").expect("static regex"));

/// Which pass accepted the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderPass {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSearch {
    Found { row: usize, pass: HeaderPass },
    NotFound,
}

impl HeaderSearch {
    pub fn row(&self) -> Option<usize> {
        match self {
            HeaderSearch::Found { row, .. } => Some(*row),
            HeaderSearch::NotFound => None,
        }
    }
}

/// How one candidate row looks to the two heuristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowScore {
    pub cells: usize,
    pub occupation_vocab: bool,
    pub data_vocab: bool,
}

pub fn score_row(texts: &[String]) -> RowScore {
    RowScore {
        cells: texts.len(),
        occupation_vocab: texts.iter().any(|t| OCCUPATION_VOCAB.is_match(t)),
        data_vocab: texts.iter().any(|t| DATA_VOCAB.is_match(t)),
    }
}

/// Find the header row among the first `scan_rows` rows of `sheet`.
///
/// A row qualifies with at least three non-empty cells and either occupation
/// or data vocabulary. When nothing qualifies, the first row with two or more
/// cells mentioning `soc`/`code` is taken instead.
pub fn locate_header(sheet: &Sheet, scan_rows: usize) -> HeaderSearch {
    let limit = scan_rows.min(sheet.rows.len());

    for idx in 0..limit {
        let texts = sheet.row_texts(idx);
        let score = score_row(&texts);
        trace!(sheet = %sheet.name, row = idx, ?score, "scored row");
        if score.cells >= 3 && (score.occupation_vocab || score.data_vocab) {
            debug!(sheet = %sheet.name, row = idx, "header row found");
            return HeaderSearch::Found {
                row: idx,
                pass: HeaderPass::Primary,
            };
        }
    }

    for idx in 0..limit {
        let texts = sheet.row_texts(idx);
        if texts.len() >= 2 && texts.iter().any(|t| FALLBACK_VOCAB.is_match(t)) {
            debug!(sheet = %sheet.name, row = idx, "header row found by fallback");
            return HeaderSearch::Found {
                row: idx,
                pass: HeaderPass::Fallback,
            };
        }
    }

    HeaderSearch::NotFound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HEADER_SCAN_ROWS;

    fn header() -> Vec<&'static str> {
        vec![
            "2023 National Employment Matrix title",
            "2023 National Employment Matrix code",
            "Employment, 2023",
            "Employment, 2033",
        ]
    }

    fn sheet_with_noise(noise: usize) -> Sheet {
        let mut rows: Vec<Vec<&str>> = Vec::new();
        for i in 0..noise {
            if i % 3 == 0 {
                rows.push(vec![]);
            } else if i % 3 == 1 {
                rows.push(vec!["Table 1.2 Employment by detailed occupation, 2023 and projected 2033"]);
            } else {
                rows.push(vec!["(Numbers in thousands)", ""]);
            }
        }
        rows.push(header());
        rows.push(vec!["Actuaries", "15-2011", "30.2", "37.1"]);
        Sheet::from_strings("Table 1.2", &rows)
    }

    #[test]
    fn finds_header_after_zero_to_fourteen_noise_rows() {
        for noise in 0..=14 {
            let sheet = sheet_with_noise(noise);
            assert_eq!(
                locate_header(&sheet, DEFAULT_HEADER_SCAN_ROWS),
                HeaderSearch::Found {
                    row: noise,
                    pass: HeaderPass::Primary
                },
                "noise rows = {}",
                noise
            );
        }
    }

    #[test]
    fn header_beyond_cap_is_not_found() {
        let sheet = sheet_with_noise(15);
        assert_eq!(
            locate_header(&sheet, DEFAULT_HEADER_SCAN_ROWS),
            HeaderSearch::NotFound
        );
    }

    #[test]
    fn sheet_without_vocabulary_is_not_found() {
        let sheet = Sheet::from_strings(
            "Notes",
            &[vec!["alpha", "beta", "gamma"], vec!["1", "2", "3"]],
        );
        assert_eq!(locate_header(&sheet, 15), HeaderSearch::NotFound);
    }

    #[test]
    fn two_cell_code_row_uses_fallback() {
        let sheet = Sheet::from_strings(
            "Table 1.9",
            &[vec!["STEM occupations"], vec!["SOC code", "Title"], vec!["15-1252", "Software developers"]],
        );
        assert_eq!(
            locate_header(&sheet, 15),
            HeaderSearch::Found {
                row: 1,
                pass: HeaderPass::Fallback
            }
        );
    }

    #[test]
    fn first_qualifying_row_wins() {
        let sheet = Sheet::from_strings(
            "Table 1.1",
            &[
                vec!["Occupation", "Code", "Employment, 2023"],
                vec!["Occupation title", "SOC code", "Employment, 2033"],
            ],
        );
        assert_eq!(locate_header(&sheet, 15).row(), Some(0));
    }
}
