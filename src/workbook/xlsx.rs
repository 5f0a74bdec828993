// src/workbook/xlsx.rs

use anyhow::{Context, Result};
use calamine::{open_workbook_auto, Data, Range, Reader};
use std::path::Path;
use tracing::{debug, warn};

use super::{Cell, Sheet};

/// Read every worksheet of an Excel/ODS file.
pub fn read_spreadsheet(path: &Path) -> Result<Vec<Sheet>> {
    let mut wb = open_workbook_auto(path)
        .with_context(|| format!("opening spreadsheet {:?}", path))?;

    let names: Vec<String> = wb.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        match wb.worksheet_range(&name) {
            Ok(range) => {
                let rows = range_to_rows(&range);
                debug!(sheet = %name, rows = rows.len(), "read worksheet");
                sheets.push(Sheet::new(name, rows));
            }
            // a broken sheet should not hide the others
            Err(e) => warn!(sheet = %name, error = %e, "skipping unreadable worksheet"),
        }
    }
    Ok(sheets)
}

/// calamine trims the used range; pad it back so row indices match the sheet.
fn range_to_rows(range: &Range<Data>) -> Vec<Vec<Cell>> {
    let (top, left) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); top];
    for row in range.rows() {
        let mut cells = vec![Cell::Empty; left];
        cells.extend(row.iter().map(to_cell));
        rows.push(cells);
    }
    rows
}

fn to_cell(d: &Data) -> Cell {
    match d {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::from_text(s),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        // dates, durations and error cells are kept as their display text
        other => Cell::from_text(&other.to_string()),
    }
}
