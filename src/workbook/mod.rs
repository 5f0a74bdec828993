// src/workbook/mod.rs
//! Opens a workbook and exposes each named sheet as a raw grid of cells.
//!
//! Three layouts are understood: spreadsheet files (read with calamine), a
//! `.zip` bundle of CSV files, and a directory of CSV files. For the CSV
//! layouts every file is one sheet named after its file stem.

pub mod delimited;
pub mod xlsx;

use anyhow::{bail, Result};
use std::path::Path;
use tracing::{info, instrument};

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// Build a cell from raw CSV text; blank strings are `Empty`.
    pub fn from_text(raw: &str) -> Self {
        let t = raw.trim();
        if t.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(t.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }

    /// Display form of the cell, trimmed. Whole numbers print without a fraction.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.trim().to_string(),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// One sheet: a name and its rows, top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Convenience for tests and CSV input: every string becomes a text cell.
    pub fn from_strings(name: impl Into<String>, rows: &[Vec<&str>]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|s| Cell::from_text(s)).collect())
            .collect();
        Self::new(name, rows)
    }

    pub fn row(&self, idx: usize) -> Option<&[Cell]> {
        self.rows.get(idx).map(Vec::as_slice)
    }

    /// Non-empty cell strings of row `idx`.
    pub fn row_texts(&self, idx: usize) -> Vec<String> {
        self.row(idx)
            .map(|r| {
                r.iter()
                    .filter(|c| !c.is_empty())
                    .map(Cell::as_text)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// All sheets of one source, in workbook order.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook {
    pub source: String,
    pub sheets: Vec<Sheet>,
}

/// Open `path`, picking the reader from its shape.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn open_workbook<P: AsRef<Path>>(path: P) -> Result<Workbook> {
    let path = path.as_ref();
    if !path.exists() {
        bail!("{} does not exist", path.display());
    }

    let sheets = if path.is_dir() {
        delimited::read_csv_dir(path)?
    } else {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "zip" => delimited::read_csv_zip(path)?,
            "csv" => vec![delimited::read_csv_file(path)?],
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => xlsx::read_spreadsheet(path)?,
            other => bail!("unsupported workbook type `{}`", other),
        }
    };

    info!(sheets = sheets.len(), "workbook opened");
    Ok(Workbook {
        source: path.display().to_string(),
        sheets,
    })
}
