// src/sheet/mod.rs
//! Structural analysis of one sheet: where the header is, what each column
//! means, and which years the sheet is about.

pub mod columns;
pub mod header;
pub mod years;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::RecordError;
use crate::workbook::{Cell, Sheet};
use columns::{match_columns, ColumnBinding, FieldKey, FieldMapping};
use header::{locate_header, HeaderSearch};
use years::{classify_years, extract_year_span, years_in, YearRole, YearSpan};

/// Base and projection year a sheet reports on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SheetYears {
    pub base: Option<i32>,
    pub projection: Option<i32>,
}

impl SheetYears {
    fn from_span(span: YearSpan) -> Self {
        match span {
            YearSpan::Range { start, end } => Self {
                base: Some(start),
                projection: Some(end),
            },
            YearSpan::Single(y) => Self {
                base: Some(y),
                projection: None,
            },
        }
    }
}

/// Everything learned about a sheet before any data row is read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SheetLayout {
    pub header_row: usize,
    pub headers: Vec<String>,
    pub mapping: FieldMapping,
    pub years: SheetYears,
    pub warnings: Vec<String>,
}

/// Locate the header, match columns and settle the employment years.
///
/// Fails with a `SourceFormat` error when no header row is found or no column
/// holds occupation codes; the caller skips the sheet.
pub fn analyze_sheet(sheet: &Sheet, scan_rows: usize) -> Result<SheetLayout, RecordError> {
    let header_row = match locate_header(sheet, scan_rows) {
        HeaderSearch::Found { row, .. } => row,
        HeaderSearch::NotFound => {
            return Err(RecordError::sheet_format(
                &sheet.name,
                format!("no header row within the first {} rows", scan_rows),
            ))
        }
    };

    let headers: Vec<String> = sheet
        .row(header_row)
        .map(|r| r.iter().map(Cell::as_text).collect())
        .unwrap_or_default();
    let mut mapping = match_columns(&headers);

    if !mapping.contains(FieldKey::OccupationCode) {
        return Err(RecordError::SourceFormat {
            sheet: sheet.name.clone(),
            code: None,
            field: Some(FieldKey::OccupationCode.as_str().to_string()),
            reason: "no column matches occupation code".into(),
        });
    }

    let mut warnings = Vec::new();
    let years = resolve_years(sheet, header_row, &headers, &mut mapping, &mut warnings);
    debug!(
        sheet = %sheet.name,
        header_row,
        base = ?years.base,
        projection = ?years.projection,
        "analyzed sheet"
    );

    Ok(SheetLayout {
        header_row,
        headers,
        mapping,
        years,
        warnings,
    })
}

/// Work out the sheet's years and bind base/projected employment columns.
fn resolve_years(
    sheet: &Sheet,
    header_row: usize,
    headers: &[String],
    mapping: &mut FieldMapping,
    warnings: &mut Vec<String>,
) -> SheetYears {
    // 1) the employment columns themselves
    let candidates: Vec<ColumnBinding> = mapping.employment_candidates().to_vec();
    let cand_headers: Vec<String> = candidates.iter().map(|c| c.header.clone()).collect();
    let emp = classify_years(&cand_headers);
    warnings.extend(emp.warnings.iter().cloned());

    // 2) a range anywhere in the header row ("change, 2023-33")
    let header_range = headers
        .iter()
        .filter_map(|h| extract_year_span(h))
        .find(|s| matches!(s, YearSpan::Range { .. }));

    let mut years = SheetYears::default();
    match (emp.with_role(YearRole::Base), emp.with_role(YearRole::Projection)) {
        (Some(b), Some(p)) => {
            mapping.bind(FieldKey::BaseEmployment, candidates[b.position].clone());
            mapping.bind(FieldKey::ProjectedEmployment, candidates[p.position].clone());
            years.base = Some(b.span.first());
            years.projection = Some(p.span.first());
        }
        _ => {
            if let Some(range) = header_range {
                years = SheetYears::from_span(range);
            }
            if let Some(tag) = emp.tags.first() {
                let y = tag.span.first();
                let key = if years.projection == Some(y) && years.base != Some(y) {
                    FieldKey::ProjectedEmployment
                } else {
                    FieldKey::BaseEmployment
                };
                mapping.bind(key, candidates[tag.position].clone());
                if years.base.is_none() {
                    years.base = Some(y);
                }
            }
        }
    }

    // 3) any other years in the header row
    if years.base.is_none() {
        let all = classify_years(headers);
        if let Some(b) = all.with_role(YearRole::Base) {
            years.base = Some(b.span.first());
            years.projection = all.with_role(YearRole::Projection).map(|p| p.span.first());
        } else if let Some(only) = all.tags.first() {
            years = SheetYears::from_span(only.span);
        }
    }

    // 4) title rows above the header ("… 2023 and projected 2033")
    if years.base.is_none() {
        for idx in 0..header_row {
            let found = years_in(&sheet.row_texts(idx).join(" "));
            if let (Some(min), Some(max)) = (found.first(), found.last()) {
                years.base = Some(*min);
                years.projection = (max != min).then_some(*max);
                break;
            }
        }
    }

    if years.base.is_none() {
        let msg = format!("sheet `{}` carries no year information", sheet.name);
        warn!("{}", msg);
        warnings.push(msg);
    }
    years
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_sheet_binds_base_and_projected() {
        let sheet = Sheet::from_strings(
            "Table 1.2",
            &[
                vec!["Table 1.2 Employment by detailed occupation"],
                vec![
                    "Occupation title",
                    "SOC code",
                    "Employment, 2033",
                    "Employment, 2023",
                    "Employment change, percent, 2023-33",
                ],
            ],
        );
        let layout = analyze_sheet(&sheet, 15).unwrap();
        assert_eq!(layout.header_row, 1);
        assert_eq!(layout.mapping.get(FieldKey::BaseEmployment).unwrap().index, 3);
        assert_eq!(layout.mapping.get(FieldKey::ProjectedEmployment).unwrap().index, 2);
        assert_eq!(
            layout.years,
            SheetYears {
                base: Some(2023),
                projection: Some(2033)
            }
        );
    }

    #[test]
    fn range_header_supplies_years_for_special_tables() {
        let sheet = Sheet::from_strings(
            "Table 1.3",
            &[vec![
                "Occupation title",
                "SOC code",
                "Employment change, percent, 2023-33",
                "Median annual wage, 2023",
            ]],
        );
        let layout = analyze_sheet(&sheet, 15).unwrap();
        assert_eq!(layout.years.base, Some(2023));
        assert_eq!(layout.years.projection, Some(2033));
        assert!(layout.mapping.get(FieldKey::BaseEmployment).is_none());
    }

    #[test]
    fn title_rows_are_the_last_resort() {
        let sheet = Sheet::from_strings(
            "Table 1.9",
            &[
                vec!["Table 1.9 STEM occupations, 2023 and projected 2033"],
                vec!["SOC code", "Occupation title", "STEM category"],
            ],
        );
        let layout = analyze_sheet(&sheet, 15).unwrap();
        assert_eq!(layout.years.base, Some(2023));
        assert_eq!(layout.years.projection, Some(2033));

        let sheet = Sheet::from_strings(
            "Table 1.10",
            &[
                vec!["Table 1.10 Occupational separations and openings, projected 2023\u{2013}33"],
                vec!["SOC code", "Occupation title", "Typical education"],
            ],
        );
        let layout = analyze_sheet(&sheet, 15).unwrap();
        assert_eq!(layout.years.base, Some(2023));
        assert_eq!(layout.years.projection, Some(2033));
    }

    #[test]
    fn missing_code_column_is_a_source_format_error() {
        let sheet = Sheet::from_strings(
            "Table 1.1",
            &[vec!["Occupation title", "Employment, 2023", "Employment, 2033"]],
        );
        let err = analyze_sheet(&sheet, 15).unwrap_err();
        assert!(matches!(err, RecordError::SourceFormat { field: Some(_), .. }));
    }
}
