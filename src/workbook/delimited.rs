// src/workbook/delimited.rs

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use glob::glob;
use std::{
    fs::File,
    io::{Cursor, Read},
    path::Path,
};
use tracing::{debug, trace};
use zip::ZipArchive;

use super::{Cell, Sheet};

/// Parse CSV bytes into rows. Records may have differing field counts.
pub fn parse_csv_rows(data: &[u8]) -> Result<Vec<Vec<Cell>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(data));

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }
    Ok(rows)
}

fn sheet_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

pub fn read_csv_file(path: &Path) -> Result<Sheet> {
    let mut buf = Vec::new();
    File::open(path)
        .and_then(|mut f| f.read_to_end(&mut buf))
        .with_context(|| format!("reading {:?}", path))?;
    let rows = parse_csv_rows(&buf).with_context(|| format!("parsing {:?}", path))?;
    Ok(Sheet::new(sheet_name_of(path), rows))
}

/// Every `*.csv` in `dir`, sorted by file name.
pub fn read_csv_dir(dir: &Path) -> Result<Vec<Sheet>> {
    let pattern = format!("{}/*.csv", dir.display());
    let mut paths: Vec<_> = glob(&pattern)
        .context("invalid glob pattern for csv directory")?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let mut sheets = Vec::with_capacity(paths.len());
    for p in paths {
        trace!(path = %p.display(), "reading csv sheet");
        sheets.push(read_csv_file(&p)?);
    }
    Ok(sheets)
}

/// Every `.csv` entry of a ZIP bundle, in archive order.
pub fn read_csv_zip(zip_path: &Path) -> Result<Vec<Sheet>> {
    // 1) Open the ZIP once
    let file =
        File::open(zip_path).with_context(|| format!("Failed to open ZIP file: {:?}", zip_path))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("Failed to read ZIP archive: {:?}", zip_path))?;

    // 2) Parse each .csv entry
    let mut sheets = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to access ZIP entry #{} in {:?}", i, zip_path))?;
        let name = entry.name().to_string();
        if !entry.is_file() || !name.to_lowercase().ends_with(".csv") {
            continue;
        }

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("Failed to read {} into memory", name))?;
        let rows = parse_csv_rows(&buf).with_context(|| format!("parsing {}", name))?;
        debug!(entry = %name, rows = rows.len(), "read csv entry");
        sheets.push(Sheet::new(sheet_name_of(Path::new(&name)), rows));
    }
    Ok(sheets)
}
