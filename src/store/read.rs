// src/store/read.rs
//! Keyed lookups that rebuild measures, suppression markers included.

use duckdb::{params, Connection};
use serde_json::Value as Json;
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::extract::{Measure, MeasureFlag};
use crate::normalize::{ProjectionRecord, SpecialTableRecord, WageBenchmarkRecord};
use crate::taxonomy::code::SocCode;

type Flags = BTreeMap<String, MeasureFlag>;

fn parse_flags(raw: Option<String>) -> Result<Flags, StoreError> {
    match raw {
        Some(s) => Ok(serde_json::from_str(&s)?),
        None => Ok(Flags::new()),
    }
}

fn measure(value: Option<f64>, flags: &Flags, col: &str) -> Measure {
    Measure::from_stored(value, flags.get(col))
}

pub fn wage(
    conn: &Connection,
    code: &SocCode,
    region: &str,
    data_year: i32,
) -> Result<Option<WageBenchmarkRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT region_name, mean_annual, median_annual, mean_hourly, median_hourly,
                benefit_annual, value_flags
         FROM occupation_data
         WHERE occupation_code = ? AND region = ? AND data_year = ?",
    )?;
    let mut rows = stmt.query(params![code.as_str(), region, data_year])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let flags = parse_flags(row.get(6)?)?;
    Ok(Some(WageBenchmarkRecord {
        occupation_code: code.clone(),
        region: region.to_string(),
        region_name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        data_year,
        mean_annual: measure(row.get(1)?, &flags, "mean_annual"),
        median_annual: measure(row.get(2)?, &flags, "median_annual"),
        mean_hourly: measure(row.get(3)?, &flags, "mean_hourly"),
        median_hourly: measure(row.get(4)?, &flags, "median_hourly"),
        benefit_annual: measure(row.get(5)?, &flags, "benefit_annual"),
    }))
}

pub fn projection(
    conn: &Connection,
    code: &SocCode,
    base_year: i32,
    projection_year: i32,
) -> Result<Option<ProjectionRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT base_employment, employment, employment_change, employment_percent_change,
                annual_openings, median_wage, typical_education, work_experience,
                on_job_training, summary, factors, value_flags
         FROM projections
         WHERE occupation_code = ? AND base_year = ? AND projection_year = ?",
    )?;
    let mut rows = stmt.query(params![code.as_str(), base_year, projection_year])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let flags = parse_flags(row.get(11)?)?;
    Ok(Some(ProjectionRecord {
        occupation_code: code.clone(),
        base_year,
        projection_year,
        base_employment: measure(row.get(0)?, &flags, "base_employment"),
        employment: measure(row.get(1)?, &flags, "employment"),
        employment_change: measure(row.get(2)?, &flags, "employment_change"),
        employment_percent_change: measure(row.get(3)?, &flags, "employment_percent_change"),
        annual_openings: measure(row.get(4)?, &flags, "annual_openings"),
        median_wage: measure(row.get(5)?, &flags, "median_wage"),
        typical_education: row.get(6)?,
        work_experience: row.get(7)?,
        on_job_training: row.get(8)?,
        summary: row.get(9)?,
        factors: row.get(10)?,
    }))
}

pub fn special(
    conn: &Connection,
    code: &SocCode,
    table_number: &str,
    data_year: i32,
) -> Result<Option<SpecialTableRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT table_name, value, value_type, additional_data, value_flags
         FROM bls_special_tables
         WHERE occupation_code = ? AND table_number = ? AND data_year = ?",
    )?;
    let mut rows = stmt.query(params![code.as_str(), table_number, data_year])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let flags = parse_flags(row.get(4)?)?;
    let bag: Option<String> = row.get(3)?;
    Ok(Some(SpecialTableRecord {
        occupation_code: code.clone(),
        table_number: table_number.to_string(),
        table_name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
        data_year,
        value: measure(row.get(1)?, &flags, "value"),
        value_type: row.get(2)?,
        additional_data: match bag {
            Some(s) => serde_json::from_str(&s)?,
            None => Json::Null,
        },
    }))
}

/// Row count of one of the known tables.
pub fn count(conn: &Connection, table: &str) -> Result<i64, StoreError> {
    let n = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
    Ok(n)
}
