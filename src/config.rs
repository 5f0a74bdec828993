// src/config.rs

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::error::FatalError;

/// Rows 0..=14 are inspected when looking for the header row.
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 15;

/// Everything a stage needs to run. Loaded from YAML, then overridden by CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub workbook: Option<PathBuf>,
    pub taxonomy: Option<PathBuf>,
    /// DuckDB file, or `:memory:`.
    pub database: String,
    pub region: String,
    pub region_name: String,
    pub default_data_year: Option<i32>,
    pub suppression_sentinels: Vec<String>,
    pub header_scan_rows: usize,
    /// Only sheets whose name matches are processed.
    pub sheet_filter: Option<String>,
    pub summary_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workbook: None,
            taxonomy: None,
            database: "bls.duckdb".to_string(),
            region: "US".to_string(),
            region_name: "United States".to_string(),
            default_data_year: None,
            suppression_sentinels: vec!["*".into(), "**".into(), "***".into(), "#".into()],
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
            sheet_filter: None,
            summary_path: None,
        }
    }
}

impl PipelineConfig {
    /// Read a YAML config; missing keys fall back to the defaults.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let cfg: PipelineConfig =
            serde_yaml::from_str(&text).with_context(|| format!("parsing config {:?}", path))?;
        Ok(cfg)
    }

    pub fn workbook_path(&self) -> Result<&Path, FatalError> {
        self.workbook
            .as_deref()
            .ok_or_else(|| FatalError::Config("no workbook path given".into()))
    }

    pub fn taxonomy_path(&self) -> Result<&Path, FatalError> {
        self.taxonomy
            .as_deref()
            .ok_or_else(|| FatalError::Config("no taxonomy path given".into()))
    }

    /// Compiled `sheet_filter`, if any.
    pub fn sheet_regex(&self) -> Result<Option<Regex>, FatalError> {
        match &self.sheet_filter {
            None => Ok(None),
            Some(pat) => Regex::new(pat)
                .map(Some)
                .map_err(|e| FatalError::Config(format!("sheet_filter `{}`: {}", pat, e))),
        }
    }

    pub fn validate(&self) -> Result<(), FatalError> {
        if self.header_scan_rows == 0 {
            return Err(FatalError::Config("header_scan_rows must be > 0".into()));
        }
        if self.database.trim().is_empty() {
            return Err(FatalError::Config("database must not be empty".into()));
        }
        self.sheet_regex()?;
        Ok(())
    }
}
