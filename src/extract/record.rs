// src/extract/record.rs

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace, warn};

use super::table::{identify_table, TableId, TableKind};
use super::value::{FieldValue, Measure, NumberParser};
use crate::error::RecordError;
use crate::sheet::columns::{ColumnBinding, FieldKey};
use crate::sheet::years::extract_year_span;
use crate::sheet::{analyze_sheet, SheetLayout, SheetYears};
use crate::taxonomy::code::SocCode;
use crate::workbook::{Cell, Sheet};

/// Knobs for turning a sheet into records.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub scan_rows: usize,
    pub parser: NumberParser,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            scan_rows: crate::config::DEFAULT_HEADER_SCAN_ROWS,
            parser: NumberParser::default(),
        }
    }
}

/// Where a record came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SheetSource {
    pub sheet: String,
    pub table: TableId,
}

/// One data row, tagged with its table and keyed by occupation code.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedRecord {
    pub source: SheetSource,
    pub row: usize,
    pub code: SocCode,
    pub title: Option<String>,
    pub fields: BTreeMap<FieldKey, FieldValue>,
    /// Columns no semantic key claimed, by header text.
    pub extras: BTreeMap<String, FieldValue>,
    pub years: SheetYears,
    /// Year embedded in the header of each bound field, when there is one.
    pub field_years: BTreeMap<FieldKey, i32>,
}

impl ExtractedRecord {
    pub fn table(&self) -> TableKind {
        self.source.table.kind
    }

    pub fn measure(&self, key: FieldKey) -> Measure {
        self.fields
            .get(&key)
            .map(FieldValue::measure)
            .unwrap_or(Measure::Missing)
    }

    pub fn text(&self, key: FieldKey) -> Option<&str> {
        self.fields.get(&key).and_then(FieldValue::text)
    }

    pub fn has_any<F: Fn(&FieldKey) -> bool>(&self, pred: F) -> bool {
        self.fields.keys().any(pred)
    }
}

/// All records of one sheet plus the problems met while reading it.
#[derive(Debug, Clone)]
pub struct SheetExtraction {
    pub sheet: String,
    pub table: TableId,
    pub layout: SheetLayout,
    pub records: Vec<ExtractedRecord>,
    pub issues: Vec<RecordError>,
    /// Blank and note rows passed over without complaint.
    pub skipped_rows: usize,
    /// Data rows dropped because their code is not a SOC code.
    pub rejected_rows: usize,
}

/// Analyze `sheet` and extract one record per data row.
///
/// A sheet without a header row or code column is returned as `Err`; problems
/// with single rows or fields are collected in `issues` and the rest of the
/// sheet is still read.
#[instrument(level = "info", skip_all, fields(sheet = %sheet.name))]
pub fn extract_sheet(
    sheet: &Sheet,
    opts: &ExtractOptions,
) -> Result<SheetExtraction, RecordError> {
    let layout = analyze_sheet(sheet, opts.scan_rows)?;
    let table = identify_table(sheet, layout.header_row);
    let source = SheetSource {
        sheet: sheet.name.clone(),
        table: table.clone(),
    };

    let mut issues: Vec<RecordError> = layout
        .warnings
        .iter()
        .map(|w| RecordError::sheet_format(&sheet.name, w.clone()))
        .collect();

    if let Some(canonical) = table.kind.canonical_field() {
        if !layout.mapping.contains(canonical) {
            warn!(sheet = %sheet.name, field = canonical.as_str(), "canonical column missing");
            issues.push(RecordError::SourceFormat {
                sheet: sheet.name.clone(),
                code: None,
                field: Some(canonical.as_str().to_string()),
                reason: format!("no column for {}", canonical.as_str()),
            });
        }
    }

    // bound columns, and the leftovers that go into the extras bag
    let bound: Vec<(FieldKey, ColumnBinding)> = layout
        .mapping
        .bindings()
        .filter(|(k, _)| **k != FieldKey::OccupationCode && **k != FieldKey::OccupationTitle)
        .map(|(k, b)| (*k, b.clone()))
        .collect();
    let bound_idx: Vec<usize> = layout.mapping.bindings().map(|(_, b)| b.index).collect();
    let leftovers: Vec<ColumnBinding> = layout
        .mapping
        .unmapped()
        .iter()
        .chain(layout.mapping.employment_candidates())
        .filter(|b| !bound_idx.contains(&b.index))
        .cloned()
        .collect();

    let field_years: BTreeMap<FieldKey, i32> = bound
        .iter()
        .filter_map(|(k, b)| extract_year_span(&b.header).map(|s| (*k, s.first())))
        .collect();

    let code_col = layout
        .mapping
        .get(FieldKey::OccupationCode)
        .map(|b| b.index)
        .unwrap_or(0);
    let title_col = layout.mapping.get(FieldKey::OccupationTitle).map(|b| b.index);

    let mut records = Vec::new();
    let mut skipped_rows = 0usize;
    let mut rejected_rows = 0usize;

    for row_idx in layout.header_row + 1..sheet.rows.len() {
        let row = &sheet.rows[row_idx];
        let non_empty = row.iter().filter(|c| !c.is_empty()).count();
        let code_text = row.get(code_col).map(Cell::as_text).unwrap_or_default();

        // blank lines, footnotes and section notes
        if code_text.is_empty() || non_empty < 2 {
            skipped_rows += 1;
            continue;
        }

        let code = match SocCode::parse(&code_text) {
            Some(c) => c,
            None => {
                warn!(sheet = %sheet.name, row = row_idx, code = %code_text, "invalid occupation code");
                issues.push(RecordError::SourceFormat {
                    sheet: sheet.name.clone(),
                    code: Some(code_text),
                    field: Some(FieldKey::OccupationCode.as_str().to_string()),
                    reason: format!("row {}: not a SOC code", row_idx),
                });
                rejected_rows += 1;
                continue;
            }
        };

        let mut fields = BTreeMap::new();
        for (key, binding) in &bound {
            let cell = row.get(binding.index).unwrap_or(&Cell::Empty);
            if cell.is_empty() {
                continue;
            }
            let value = if key.is_numeric() {
                let m = opts.parser.parse_cell(cell);
                if let Measure::Unparseable(raw) = &m {
                    warn!(sheet = %sheet.name, code = %code, field = key.as_str(), raw = %raw, "unparseable value");
                    issues.push(RecordError::DataType {
                        sheet: sheet.name.clone(),
                        row: row_idx,
                        code: code.to_string(),
                        field: key.as_str().to_string(),
                        raw: raw.clone(),
                    });
                }
                FieldValue::Numeric(m)
            } else {
                FieldValue::Text(cell.as_text())
            };
            fields.insert(*key, value);
        }

        let mut extras = BTreeMap::new();
        for binding in &leftovers {
            let cell = row.get(binding.index).unwrap_or(&Cell::Empty);
            if cell.is_empty() {
                continue;
            }
            let value = match opts.parser.parse_cell(cell) {
                m @ (Measure::Value(_) | Measure::Suppressed(_)) => FieldValue::Numeric(m),
                _ => FieldValue::Text(cell.as_text()),
            };
            extras.insert(binding.header.clone(), value);
        }

        let title = title_col
            .and_then(|i| row.get(i))
            .map(Cell::as_text)
            .filter(|t| !t.is_empty());

        trace!(code = %code, fields = fields.len(), extras = extras.len(), "extracted row");
        records.push(ExtractedRecord {
            source: source.clone(),
            row: row_idx,
            code,
            title,
            fields,
            extras,
            years: layout.years,
            field_years: field_years.clone(),
        });
    }

    debug!(
        sheet = %sheet.name,
        table = %table.number,
        records = records.len(),
        issues = issues.len(),
        skipped_rows,
        rejected_rows,
        "extracted sheet"
    );

    Ok(SheetExtraction {
        sheet: sheet.name.clone(),
        table,
        layout,
        records,
        issues,
        skipped_rows,
        rejected_rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn projections_sheet() -> Sheet {
        Sheet::from_strings(
            "Table 1.2",
            &[
                vec!["Table 1.2 Employment by detailed occupation, 2023 and projected 2033"],
                vec!["(Numbers in thousands)"],
                vec![
                    "2023 National Employment Matrix title",
                    "2023 National Employment Matrix code",
                    "Employment, 2023",
                    "Employment, 2033",
                    "Employment change, percent, 2023\u{2013}33",
                    "Median annual wage, dollars, 2023(1)",
                    "Percent self employed, 2023",
                ],
                vec!["Actuaries", "15\u{2013}2011", "50", "65", "30", "120,000", "2.1"],
                vec!["Statisticians", "15-2041", "n/a", "40", "*", "$104,110", ""],
                vec!["Bogus", "ABC", "1", "2", "3", "4", "5"],
                vec![],
                vec!["Footnotes:"],
                vec!["(1) Data are from the Occupational Employment and Wage Statistics program"],
            ],
        )
    }

    #[test]
    fn extracts_rows_with_fields_and_extras() {
        let ex = extract_sheet(&projections_sheet(), &ExtractOptions::default()).unwrap();
        assert_eq!(ex.table.kind, TableKind::Projections);
        assert_eq!(ex.records.len(), 2);

        let actuaries = &ex.records[0];
        assert_eq!(actuaries.code.as_str(), "15-2011");
        assert_eq!(actuaries.title.as_deref(), Some("Actuaries"));
        assert_eq!(actuaries.measure(FieldKey::BaseEmployment), Measure::Value(50.0));
        assert_eq!(actuaries.measure(FieldKey::ProjectedEmployment), Measure::Value(65.0));
        assert_eq!(
            actuaries.measure(FieldKey::EmploymentPercentChange),
            Measure::Value(30.0)
        );
        assert_eq!(actuaries.measure(FieldKey::MedianAnnualWage), Measure::Value(120000.0));
        assert_eq!(
            actuaries.extras.get("Percent self employed, 2023"),
            Some(&FieldValue::Numeric(Measure::Value(2.1)))
        );
        assert_eq!(actuaries.field_years.get(&FieldKey::MedianAnnualWage), Some(&2023));
        assert_eq!(actuaries.years.base, Some(2023));
        assert_eq!(actuaries.years.projection, Some(2033));
    }

    #[test]
    fn bad_cells_become_markers_and_issues() {
        let ex = extract_sheet(&projections_sheet(), &ExtractOptions::default()).unwrap();
        let stats = &ex.records[1];
        assert_eq!(
            stats.measure(FieldKey::BaseEmployment),
            Measure::Unparseable("n/a".into())
        );
        assert_eq!(
            stats.measure(FieldKey::EmploymentPercentChange),
            Measure::Suppressed("*".into())
        );

        let data_type = ex
            .issues
            .iter()
            .filter(|i| matches!(i, RecordError::DataType { .. }))
            .count();
        let bad_code = ex
            .issues
            .iter()
            .filter(|i| matches!(i, RecordError::SourceFormat { code: Some(c), .. } if c == "ABC"))
            .count();
        assert_eq!(data_type, 1);
        assert_eq!(bad_code, 1);
        // blank line and two footnote lines
        assert_eq!(ex.skipped_rows, 3);
        // only the bad code drops a row, the unparseable cell is kept
        assert_eq!(ex.rejected_rows, 1);
    }

    #[test]
    fn missing_canonical_column_is_reported() {
        let sheet = Sheet::from_strings(
            "Table 1.3",
            &[
                vec!["SOC code", "Occupation title", "Employment, 2023"],
                vec!["15-2011", "Actuaries", "30"],
            ],
        );
        let ex = extract_sheet(&sheet, &ExtractOptions::default()).unwrap();
        assert_eq!(ex.records.len(), 1);
        assert!(ex.issues.iter().any(|i| matches!(
            i,
            RecordError::SourceFormat { field: Some(f), .. } if f == "employment_percent_change"
        )));
    }

    #[test]
    fn sheet_without_header_is_rejected() {
        let sheet = Sheet::from_strings("Notes", &[vec!["just a note"]]);
        assert!(extract_sheet(&sheet, &ExtractOptions::default()).is_err());
    }
}
