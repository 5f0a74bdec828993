// src/store/history.rs
//! One row per `ingest` run in `ingest_runs`.

use chrono::{DateTime, Utc};
use duckdb::{params, Connection};
use serde::Serialize;

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub workbook: String,
    pub started_at: String,
    pub finished_at: String,
    pub processed: i64,
    pub persisted: i64,
    pub skipped: i64,
    pub orphans: i64,
    /// The run summary as JSON.
    pub summary: Option<String>,
}

/// Sortable, unique enough for a sequential batch job.
pub fn run_id(started: DateTime<Utc>) -> String {
    started.format("run-%Y%m%dT%H%M%S%.6fZ").to_string()
}

pub fn record_run(conn: &Connection, run: &RunRecord) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO ingest_runs (
            run_id, workbook, started_at, finished_at,
            processed, persisted, skipped, orphans, summary
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            run.run_id,
            run.workbook,
            run.started_at,
            run.finished_at,
            run.processed,
            run.persisted,
            run.skipped,
            run.orphans,
            run.summary,
        ],
    )?;
    Ok(())
}

/// Most recent runs first.
pub fn list_runs(conn: &Connection, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT run_id, workbook, started_at, finished_at, processed, persisted, skipped, orphans, summary
         FROM ingest_runs ORDER BY started_at DESC LIMIT {}",
        limit
    ))?;
    let runs = stmt
        .query_map([], |r| {
            Ok(RunRecord {
                run_id: r.get(0)?,
                workbook: r.get(1)?,
                started_at: r.get(2)?,
                finished_at: r.get(3)?,
                processed: r.get(4)?,
                persisted: r.get(5)?,
                skipped: r.get(6)?,
                orphans: r.get(7)?,
                summary: r.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(runs)
}
