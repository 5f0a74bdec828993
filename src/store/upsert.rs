// src/store/upsert.rs

use duckdb::{params, Connection};
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::extract::{Measure, MeasureFlag};
use crate::normalize::{ProjectionRecord, SpecialTableRecord, WageBenchmarkRecord};
use crate::taxonomy::OccupationRow;

/// JSON for the `value_flags` column, or NULL when every measure is plain.
pub(crate) fn value_flags(measures: &[(&str, &Measure)]) -> Result<Option<String>, StoreError> {
    let flags: BTreeMap<&str, MeasureFlag> = measures
        .iter()
        .filter_map(|(col, m)| m.flag().map(|f| (*col, f)))
        .collect();
    if flags.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(&flags)?))
}

pub fn upsert_occupation(conn: &Connection, row: &OccupationRow) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR REPLACE INTO occupations (code, name, major_group_code, occupation_type)
         VALUES (?, ?, ?, ?)",
        params![
            row.code.as_str(),
            row.name,
            row.major_group_code.as_str(),
            row.occupation_type.as_str()
        ],
    )?;
    Ok(())
}

pub fn upsert_wage(conn: &Connection, r: &WageBenchmarkRecord) -> Result<(), StoreError> {
    let flags = value_flags(&[
        ("mean_annual", &r.mean_annual),
        ("median_annual", &r.median_annual),
        ("mean_hourly", &r.mean_hourly),
        ("median_hourly", &r.median_hourly),
        ("benefit_annual", &r.benefit_annual),
    ])?;
    conn.execute(
        "INSERT OR REPLACE INTO occupation_data (
            occupation_code, region, region_name, data_year,
            mean_annual, median_annual, mean_hourly, median_hourly, benefit_annual,
            value_flags
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            r.occupation_code.as_str(),
            r.region,
            r.region_name,
            r.data_year,
            r.mean_annual.value(),
            r.median_annual.value(),
            r.mean_hourly.value(),
            r.median_hourly.value(),
            r.benefit_annual.value(),
            flags,
        ],
    )?;
    Ok(())
}

pub fn upsert_projection(conn: &Connection, r: &ProjectionRecord) -> Result<(), StoreError> {
    let flags = value_flags(&[
        ("base_employment", &r.base_employment),
        ("employment", &r.employment),
        ("employment_change", &r.employment_change),
        ("employment_percent_change", &r.employment_percent_change),
        ("annual_openings", &r.annual_openings),
        ("median_wage", &r.median_wage),
    ])?;
    conn.execute(
        "INSERT OR REPLACE INTO projections (
            occupation_code, base_year, projection_year,
            base_employment, employment, employment_change, employment_percent_change,
            annual_openings, median_wage,
            typical_education, work_experience, on_job_training, summary, factors,
            value_flags
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            r.occupation_code.as_str(),
            r.base_year,
            r.projection_year,
            r.base_employment.value(),
            r.employment.value(),
            r.employment_change.value(),
            r.employment_percent_change.value(),
            r.annual_openings.value(),
            r.median_wage.value(),
            r.typical_education,
            r.work_experience,
            r.on_job_training,
            r.summary,
            r.factors,
            flags,
        ],
    )?;
    Ok(())
}

pub fn upsert_special(conn: &Connection, r: &SpecialTableRecord) -> Result<(), StoreError> {
    let flags = value_flags(&[("value", &r.value)])?;
    let bag = serde_json::to_string(&r.additional_data)?;
    conn.execute(
        "INSERT OR REPLACE INTO bls_special_tables (
            occupation_code, table_number, table_name, data_year,
            value, value_type, additional_data, value_flags
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            r.occupation_code.as_str(),
            r.table_number,
            r.table_name,
            r.data_year,
            r.value.value(),
            r.value_type,
            bag,
            flags,
        ],
    )?;
    Ok(())
}
