// src/pipeline.rs
//! Drives the stages in order: taxonomy, workbook, extraction, merge,
//! normalization, upserts, rankings, run history.

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};
use tracing::{error, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::error::{FatalError, IssueCategory, RecordError};
use crate::extract::{extract_sheet, ExtractOptions, NumberParser, TableId};
use crate::normalize::{normalize_and_upsert, upsert_occupations, NormalizeOptions, UpsertReport};
use crate::sheet::columns::FieldKey;
use crate::sheet::SheetYears;
use crate::store::{history, OccupationStore, RunRecord};
use crate::taxonomy::code::SocCode;
use crate::taxonomy::merge::{merge_sheet, MergeReport};
use crate::taxonomy::Taxonomy;
use crate::workbook::{open_workbook, Workbook};

/// End-of-run report: what was read, what was written, what was skipped and why.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub workbook: String,
    pub sheets_seen: usize,
    pub sheets_processed: usize,
    pub sheets_skipped: usize,
    pub records_processed: usize,
    pub records_persisted: usize,
    /// Records that never reached the store, by the reason they were dropped.
    pub records_skipped: BTreeMap<IssueCategory, usize>,
    pub issues_by_category: BTreeMap<IssueCategory, usize>,
    pub orphan_codes: BTreeSet<SocCode>,
    pub merge: MergeReport,
    pub upsert: UpsertReport,
    pub rankings: Vec<String>,
    #[serde(skip)]
    pub issues: Vec<RecordError>,
}

impl RunSummary {
    fn note(&mut self, issue: RecordError) {
        *self.issues_by_category.entry(issue.category()).or_default() += 1;
        self.issues.push(issue);
    }

    /// Record an issue whose record was dropped.
    fn skip(&mut self, issue: RecordError) {
        self.count_skipped(issue.category(), 1);
        self.note(issue);
    }

    fn count_skipped(&mut self, category: IssueCategory, n: usize) {
        if n > 0 {
            *self.records_skipped.entry(category).or_default() += n;
        }
    }

    pub fn issue_count(&self, category: IssueCategory) -> usize {
        self.issues_by_category.get(&category).copied().unwrap_or(0)
    }

    pub fn skipped_count(&self, category: IssueCategory) -> usize {
        self.records_skipped.get(&category).copied().unwrap_or(0)
    }

    /// Records dropped across all categories. Kept rows with unparseable
    /// cells and sheet-level warnings are issues but not skips.
    pub fn skipped(&self) -> usize {
        self.records_skipped.values().sum()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Per-sheet diagnostics for `inspect`.
#[derive(Debug, Clone, Serialize)]
pub struct SheetReport {
    pub sheet: String,
    pub table: Option<TableId>,
    pub header_row: Option<usize>,
    pub fields: BTreeMap<FieldKey, String>,
    pub unmapped: Vec<String>,
    pub years: SheetYears,
    pub records: usize,
    pub problems: Vec<String>,
}

fn extract_options(cfg: &PipelineConfig) -> ExtractOptions {
    ExtractOptions {
        scan_rows: cfg.header_scan_rows,
        parser: NumberParser::new(cfg.suppression_sentinels.iter().cloned()),
    }
}

fn normalize_options(cfg: &PipelineConfig) -> NormalizeOptions {
    NormalizeOptions {
        region: cfg.region.clone(),
        region_name: cfg.region_name.clone(),
        default_data_year: cfg.default_data_year,
    }
}

fn load_workbook(path: &Path) -> Result<Workbook, FatalError> {
    open_workbook(path).map_err(|e| FatalError::Workbook {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    })
}

fn selected(filter: &Option<Regex>, name: &str) -> bool {
    filter.as_ref().map_or(true, |re| re.is_match(name))
}

/// Load the taxonomy and write it into `occupations`.
#[instrument(level = "info", skip_all)]
pub fn load_taxonomy(
    cfg: &PipelineConfig,
    store: &dyn OccupationStore,
) -> Result<(Taxonomy, UpsertReport), FatalError> {
    let taxonomy = Taxonomy::load(cfg.taxonomy_path()?)?;
    let mut report = UpsertReport::default();
    upsert_occupations(&taxonomy, store, &mut report);
    info!(occupations = report.occupations, failed = report.failed, "taxonomy stored");
    Ok((taxonomy, report))
}

/// Full ingest against an already opened store.
#[instrument(level = "info", skip_all)]
pub fn ingest(cfg: &PipelineConfig, store: &dyn OccupationStore) -> Result<RunSummary, FatalError> {
    let started = Utc::now();
    cfg.validate()?;
    let filter = cfg.sheet_regex()?;

    // 1) taxonomy, fatal if unreadable
    let (mut taxonomy, occ_report) = load_taxonomy(cfg, store)?;

    // 2) workbook, fatal if unreadable
    let workbook_path = cfg.workbook_path()?;
    let workbook = load_workbook(workbook_path)?;

    let mut summary = RunSummary {
        workbook: workbook.source.clone(),
        ..Default::default()
    };
    for issue in occ_report.issues {
        summary.skip(issue);
    }

    // 3) sheets one at a time: extract, then merge into the tree
    let opts = extract_options(cfg);
    for sheet in &workbook.sheets {
        summary.sheets_seen += 1;
        if !selected(&filter, &sheet.name) {
            info!(sheet = %sheet.name, "sheet filtered out");
            continue;
        }
        match extract_sheet(sheet, &opts) {
            Ok(extraction) => {
                summary.sheets_processed += 1;
                summary.records_processed += extraction.records.len();
                summary.count_skipped(IssueCategory::SourceFormat, extraction.rejected_rows);
                for issue in extraction.issues.iter().cloned() {
                    summary.note(issue);
                }
                merge_sheet(&mut taxonomy, &extraction, &mut summary.merge);
            }
            Err(e) => {
                warn!(sheet = %sheet.name, error = %e, "sheet skipped");
                summary.sheets_skipped += 1;
                summary.note(e);
            }
        }
    }
    // every merge issue is an orphaned record
    for issue in std::mem::take(&mut summary.merge.issues) {
        summary.skip(issue);
    }
    summary.orphan_codes = summary.merge.orphan_codes.clone();

    // 4) normalize + upsert; each issue here is a record that was not written
    let mut upsert = normalize_and_upsert(&taxonomy, &normalize_options(cfg), store);
    for issue in std::mem::take(&mut upsert.issues) {
        summary.skip(issue);
    }
    summary.records_persisted = upsert.persisted();
    summary.upsert = upsert;

    // 5) derived views
    match store.refresh_rankings() {
        Ok(views) => summary.rankings = views,
        Err(e) => {
            error!(error = %e, "ranking refresh failed");
            summary.note(RecordError::Persistence {
                table: "rankings",
                key: "*".into(),
                reason: e.to_string(),
            });
        }
    }

    // 6) run history
    let encoded = match summary.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "run summary not encoded");
            None
        }
    };
    let run = RunRecord {
        run_id: history::run_id(started),
        workbook: summary.workbook.clone(),
        started_at: started.to_rfc3339(),
        finished_at: Utc::now().to_rfc3339(),
        processed: summary.records_processed as i64,
        persisted: summary.records_persisted as i64,
        skipped: summary.skipped() as i64,
        orphans: summary.orphan_codes.len() as i64,
        summary: encoded,
    };
    if let Err(e) = store.record_run(&run) {
        warn!(error = %e, "run history not recorded");
    }

    info!(
        sheets = summary.sheets_processed,
        processed = summary.records_processed,
        persisted = summary.records_persisted,
        skipped = summary.skipped(),
        orphans = summary.orphan_codes.len(),
        "ingest finished"
    );

    if let Some(path) = &cfg.summary_path {
        let json = summary.to_json().map_err(|e| FatalError::Config(e.to_string()))?;
        fs::write(path, json).map_err(|e| {
            FatalError::Config(format!("writing summary {}: {}", path.display(), e))
        })?;
    }
    Ok(summary)
}

/// Per-sheet diagnostics without touching a store.
#[instrument(level = "info", skip_all)]
pub fn inspect(cfg: &PipelineConfig) -> Result<Vec<SheetReport>, FatalError> {
    let workbook = load_workbook(cfg.workbook_path()?)?;
    let filter = cfg.sheet_regex()?;
    let opts = extract_options(cfg);

    let reports = workbook
        .sheets
        .iter()
        .filter(|s| selected(&filter, &s.name))
        .map(|sheet| match extract_sheet(sheet, &opts) {
            Ok(ex) => SheetReport {
                sheet: sheet.name.clone(),
                table: Some(ex.table.clone()),
                header_row: Some(ex.layout.header_row),
                fields: ex
                    .layout
                    .mapping
                    .bindings()
                    .map(|(k, b)| (*k, b.header.clone()))
                    .collect(),
                unmapped: ex
                    .layout
                    .mapping
                    .unmapped()
                    .iter()
                    .map(|b| b.header.clone())
                    .collect(),
                years: ex.layout.years,
                records: ex.records.len(),
                problems: ex.issues.iter().map(ToString::to_string).collect(),
            },
            Err(e) => SheetReport {
                sheet: sheet.name.clone(),
                table: None,
                header_row: None,
                fields: BTreeMap::new(),
                unmapped: Vec::new(),
                years: SheetYears::default(),
                records: 0,
                problems: vec![e.to_string()],
            },
        })
        .collect();
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_by_category() {
        let mut s = RunSummary::default();
        s.note(RecordError::sheet_format("Notes", "no header"));
        s.skip(RecordError::MergeOrphan {
            sheet: "Table 1.2".into(),
            row: 4,
            code: "99-9999".into(),
        });
        s.note(RecordError::sheet_format("Other", "no header"));
        assert_eq!(s.issue_count(IssueCategory::SourceFormat), 2);
        assert_eq!(s.issue_count(IssueCategory::MergeOrphan), 1);
        assert_eq!(s.issue_count(IssueCategory::Persistence), 0);
        assert_eq!(s.skipped_count(IssueCategory::MergeOrphan), 1);
        assert_eq!(s.skipped(), 1);

        let json: serde_json::Value = serde_json::from_str(&s.to_json().unwrap()).unwrap();
        assert_eq!(json["issues_by_category"]["source_format"], 2);
        assert_eq!(json["records_skipped"]["merge_orphan"], 1);
    }

    #[test]
    fn kept_rows_with_bad_cells_are_not_skipped() {
        let mut s = RunSummary::default();
        for field in ["employment_change", "employment_percent_change"] {
            s.note(RecordError::DataType {
                sheet: "Table 1.2".into(),
                row: 3,
                code: "15-2011".into(),
                field: field.into(),
                raw: "n/a".into(),
            });
        }
        s.note(RecordError::sheet_format("Table 1.2", "duplicate year 2023"));
        assert_eq!(s.issue_count(IssueCategory::DataType), 2);
        assert_eq!(s.skipped(), 0);

        s.count_skipped(IssueCategory::SourceFormat, 2);
        s.skip(RecordError::Persistence {
            table: "projections",
            key: "15-2011/2023/2033".into(),
            reason: "constraint".into(),
        });
        assert_eq!(s.skipped_count(IssueCategory::SourceFormat), 2);
        assert_eq!(s.skipped(), 3);
    }

    #[test]
    fn missing_paths_are_fatal() {
        let cfg = PipelineConfig::default();
        let store = crate::store::DuckStore::open(":memory:").unwrap();
        assert!(matches!(ingest(&cfg, &store), Err(FatalError::Config(_))));
    }
}
