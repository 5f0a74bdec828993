// src/error.rs

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort a run. Everything else is a `RecordError` and ends up
/// in the run summary instead.
#[derive(Error, Debug)]
pub enum FatalError {
    #[error("cannot read workbook `{path}`: {reason}")]
    Workbook { path: PathBuf, reason: String },

    #[error("cannot read taxonomy `{path}`: {reason}")]
    Taxonomy { path: PathBuf, reason: String },

    #[error("cannot reach store `{target}`: {source}")]
    Store {
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failures of a single upsert or read against the store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("duckdb: {0}")]
    Duck(#[from] duckdb::Error),

    #[error("encoding value flags: {0}")]
    Json(#[from] serde_json::Error),

    #[error("schema migration v{version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: duckdb::Error,
    },
}

/// Bucket used when counting skipped work in the end-of-run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    SourceFormat,
    DataType,
    MergeOrphan,
    Persistence,
}

impl IssueCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCategory::SourceFormat => "source_format",
            IssueCategory::DataType => "data_type",
            IssueCategory::MergeOrphan => "merge_orphan",
            IssueCategory::Persistence => "persistence",
        }
    }
}

/// A non-fatal problem with one sheet, field or record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("sheet `{sheet}`: {reason}")]
    SourceFormat {
        sheet: String,
        code: Option<String>,
        field: Option<String>,
        reason: String,
    },

    #[error("sheet `{sheet}` row {row}: `{raw}` in `{field}` for {code} is not numeric")]
    DataType {
        sheet: String,
        row: usize,
        code: String,
        field: String,
        raw: String,
    },

    #[error("sheet `{sheet}` row {row}: {code} has no detailed occupation in the taxonomy")]
    MergeOrphan {
        sheet: String,
        row: usize,
        code: String,
    },

    #[error("{table} {key}: {reason}")]
    Persistence {
        table: &'static str,
        key: String,
        reason: String,
    },
}

impl RecordError {
    pub fn category(&self) -> IssueCategory {
        match self {
            RecordError::SourceFormat { .. } => IssueCategory::SourceFormat,
            RecordError::DataType { .. } => IssueCategory::DataType,
            RecordError::MergeOrphan { .. } => IssueCategory::MergeOrphan,
            RecordError::Persistence { .. } => IssueCategory::Persistence,
        }
    }

    pub fn sheet_format(sheet: &str, reason: impl Into<String>) -> Self {
        RecordError::SourceFormat {
            sheet: sheet.to_string(),
            code: None,
            field: None,
            reason: reason.into(),
        }
    }
}
