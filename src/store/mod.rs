// src/store/mod.rs
//! DuckDB persistence: versioned schema, natural-key upserts, ranking views,
//! keyed reads and run history.

pub mod evolution;
pub mod history;
pub mod rankings;
pub mod read;
pub mod upsert;

use duckdb::Connection;
use tracing::{info, instrument};

use crate::error::{FatalError, StoreError};
use crate::extract::TableKind;
use crate::normalize::{ProjectionRecord, SpecialTableRecord, WageBenchmarkRecord};
use crate::taxonomy::{code::SocCode, OccupationRow};
pub use history::RunRecord;
pub use rankings::RankedEntry;

/// Write side used by the pipeline. Every call is one keyed upsert, so a
/// failure affects only the record passed in.
pub trait OccupationStore {
    fn upsert_occupation(&self, row: &OccupationRow) -> Result<(), StoreError>;
    fn upsert_wage(&self, record: &WageBenchmarkRecord) -> Result<(), StoreError>;
    fn upsert_projection(&self, record: &ProjectionRecord) -> Result<(), StoreError>;
    fn upsert_special(&self, record: &SpecialTableRecord) -> Result<(), StoreError>;
    fn refresh_rankings(&self) -> Result<Vec<String>, StoreError>;
    fn record_run(&self, run: &RunRecord) -> Result<(), StoreError>;
}

/// A migrated DuckDB database.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open (or create) `database` and bring its schema up to date. `:memory:`
    /// opens a throwaway in-memory database.
    #[instrument(level = "info")]
    pub fn open(database: &str) -> Result<Self, FatalError> {
        let fatal = |source: StoreError| FatalError::Store {
            target: database.to_string(),
            source,
        };
        let mut conn = if database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(database)
        }
        .map_err(|e| fatal(e.into()))?;

        let applied = evolution::migrate(&mut conn).map_err(fatal)?;
        info!(database, migrations = applied.len(), "store ready");
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn wage(
        &self,
        code: &SocCode,
        region: &str,
        data_year: i32,
    ) -> Result<Option<WageBenchmarkRecord>, StoreError> {
        read::wage(&self.conn, code, region, data_year)
    }

    pub fn projection(
        &self,
        code: &SocCode,
        base_year: i32,
        projection_year: i32,
    ) -> Result<Option<ProjectionRecord>, StoreError> {
        read::projection(&self.conn, code, base_year, projection_year)
    }

    pub fn special(
        &self,
        code: &SocCode,
        table_number: &str,
        data_year: i32,
    ) -> Result<Option<SpecialTableRecord>, StoreError> {
        read::special(&self.conn, code, table_number, data_year)
    }

    pub fn ranking(
        &self,
        kind: TableKind,
        limit: usize,
    ) -> Result<Vec<RankedEntry>, StoreError> {
        rankings::read_ranking(&self.conn, kind, limit)
    }

    pub fn runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        history::list_runs(&self.conn, limit)
    }

    pub fn count(&self, table: &str) -> Result<i64, StoreError> {
        read::count(&self.conn, table)
    }
}

impl OccupationStore for DuckStore {
    fn upsert_occupation(&self, row: &OccupationRow) -> Result<(), StoreError> {
        upsert::upsert_occupation(&self.conn, row)
    }

    fn upsert_wage(&self, record: &WageBenchmarkRecord) -> Result<(), StoreError> {
        upsert::upsert_wage(&self.conn, record)
    }

    fn upsert_projection(&self, record: &ProjectionRecord) -> Result<(), StoreError> {
        upsert::upsert_projection(&self.conn, record)
    }

    fn upsert_special(&self, record: &SpecialTableRecord) -> Result<(), StoreError> {
        upsert::upsert_special(&self.conn, record)
    }

    fn refresh_rankings(&self) -> Result<Vec<String>, StoreError> {
        rankings::refresh_rankings(&self.conn)
    }

    fn record_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        history::record_run(&self.conn, run)
    }
}
