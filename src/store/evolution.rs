// src/store/evolution.rs
//! Ordered schema migrations, each applied exactly once per database.

use chrono::Utc;
use duckdb::{params, Connection};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::error::StoreError;

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Numeric columns are NULL for suppressed or unparseable cells; the marker
/// itself lives in `value_flags` as JSON keyed by column name.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "occupations and record tables",
        sql: "
            CREATE TABLE IF NOT EXISTS occupations (
                code             VARCHAR PRIMARY KEY,
                name             VARCHAR NOT NULL,
                major_group_code VARCHAR NOT NULL,
                occupation_type  VARCHAR NOT NULL
            );
            CREATE TABLE IF NOT EXISTS occupation_data (
                occupation_code VARCHAR NOT NULL,
                region          VARCHAR NOT NULL,
                region_name     VARCHAR,
                data_year       INTEGER NOT NULL,
                mean_annual     DOUBLE,
                median_annual   DOUBLE,
                mean_hourly     DOUBLE,
                median_hourly   DOUBLE,
                benefit_annual  DOUBLE,
                value_flags     VARCHAR,
                PRIMARY KEY (occupation_code, region, data_year)
            );
            CREATE TABLE IF NOT EXISTS projections (
                occupation_code           VARCHAR NOT NULL,
                base_year                 INTEGER NOT NULL,
                projection_year           INTEGER NOT NULL,
                base_employment           DOUBLE,
                employment                DOUBLE,
                employment_change         DOUBLE,
                employment_percent_change DOUBLE,
                annual_openings           DOUBLE,
                median_wage               DOUBLE,
                typical_education         VARCHAR,
                work_experience           VARCHAR,
                on_job_training           VARCHAR,
                summary                   VARCHAR,
                factors                   VARCHAR,
                value_flags               VARCHAR,
                PRIMARY KEY (occupation_code, base_year, projection_year)
            );
            CREATE TABLE IF NOT EXISTS bls_special_tables (
                occupation_code VARCHAR NOT NULL,
                table_number    VARCHAR NOT NULL,
                table_name      VARCHAR,
                data_year       INTEGER NOT NULL,
                value           DOUBLE,
                value_type      VARCHAR NOT NULL,
                additional_data VARCHAR,
                value_flags     VARCHAR,
                PRIMARY KEY (occupation_code, table_number, data_year)
            );
        ",
    },
    Migration {
        version: 2,
        description: "ingest run history",
        sql: "
            CREATE TABLE IF NOT EXISTS ingest_runs (
                run_id      VARCHAR PRIMARY KEY,
                workbook    VARCHAR NOT NULL,
                started_at  VARCHAR NOT NULL,
                finished_at VARCHAR NOT NULL,
                processed   BIGINT NOT NULL,
                persisted   BIGINT NOT NULL,
                skipped     BIGINT NOT NULL,
                orphans     BIGINT NOT NULL,
                summary     VARCHAR
            );
        ",
    },
];

pub fn applied_versions(conn: &Connection) -> Result<BTreeSet<u32>, StoreError> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<i64>, _>>()?;
    Ok(versions.into_iter().map(|v| v as u32).collect())
}

/// Bring the schema up to the newest version. Returns the versions applied now.
pub fn migrate(conn: &mut Connection) -> Result<Vec<u32>, StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            description VARCHAR NOT NULL,
            applied_at  VARCHAR NOT NULL
        );",
    )?;
    let applied = applied_versions(conn)?;

    let mut newly = Vec::new();
    for m in MIGRATIONS.iter().filter(|m| !applied.contains(&m.version)) {
        let wrap = |source| StoreError::Migration {
            version: m.version,
            source,
        };
        let tx = conn.transaction().map_err(wrap)?;
        tx.execute_batch(m.sql).map_err(wrap)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?, ?, ?)",
            params![m.version as i64, m.description, Utc::now().to_rfc3339()],
        )
        .map_err(wrap)?;
        tx.commit().map_err(wrap)?;
        info!(version = m.version, description = m.description, "applied migration");
        newly.push(m.version);
    }
    debug!(applied = newly.len(), "schema up to date");
    Ok(newly)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_once() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(migrate(&mut conn).unwrap(), vec![1, 2]);
        assert!(migrate(&mut conn).unwrap().is_empty());
        assert_eq!(applied_versions(&conn).unwrap().len(), MIGRATIONS.len());

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name IN
                 ('occupations', 'occupation_data', 'projections', 'bls_special_tables', 'ingest_runs')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }

    #[test]
    fn versions_are_strictly_increasing() {
        let versions: Vec<u32> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|w| w[0] < w[1]));
    }
}
