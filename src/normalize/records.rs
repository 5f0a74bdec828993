// src/normalize/records.rs

use serde::Serialize;
use serde_json::{Map, Value as Json};

use crate::error::RecordError;
use crate::extract::{ExtractedRecord, Measure, TableKind};
use crate::sheet::columns::FieldKey;
use crate::taxonomy::code::SocCode;

/// Region and year fallbacks for records that do not carry their own.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeOptions {
    pub region: String,
    pub region_name: String,
    pub default_data_year: Option<i32>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            region: "US".into(),
            region_name: "United States".into(),
            default_data_year: None,
        }
    }
}

/// `occupation_data` row, keyed by (occupation_code, region, data_year).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WageBenchmarkRecord {
    pub occupation_code: SocCode,
    pub region: String,
    pub region_name: String,
    pub data_year: i32,
    pub mean_annual: Measure,
    pub median_annual: Measure,
    pub mean_hourly: Measure,
    pub median_hourly: Measure,
    pub benefit_annual: Measure,
}

/// `projections` row, keyed by (occupation_code, base_year, projection_year).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionRecord {
    pub occupation_code: SocCode,
    pub base_year: i32,
    pub projection_year: i32,
    pub base_employment: Measure,
    /// Projected employment.
    pub employment: Measure,
    pub employment_change: Measure,
    pub employment_percent_change: Measure,
    pub annual_openings: Measure,
    pub median_wage: Measure,
    pub typical_education: Option<String>,
    pub work_experience: Option<String>,
    pub on_job_training: Option<String>,
    pub summary: Option<String>,
    pub factors: Option<String>,
}

/// `bls_special_tables` row, keyed by (occupation_code, table_number, data_year).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialTableRecord {
    pub occupation_code: SocCode,
    pub table_number: String,
    pub table_name: String,
    pub data_year: i32,
    pub value: Measure,
    pub value_type: String,
    pub additional_data: Json,
}

const WAGE_YEAR_ORDER: [FieldKey; 5] = [
    FieldKey::MedianAnnualWage,
    FieldKey::MeanAnnualWage,
    FieldKey::MedianHourlyWage,
    FieldKey::MeanHourlyWage,
    FieldKey::BenefitAnnual,
];

/// Canonical value candidates for tables outside 1.1–1.12.
const UNCLASSIFIED_CANONICAL: [FieldKey; 5] = [
    FieldKey::EmploymentPercentChange,
    FieldKey::EmploymentChange,
    FieldKey::AnnualOpenings,
    FieldKey::MedianAnnualWage,
    FieldKey::BaseEmployment,
];

fn missing_year(record: &ExtractedRecord, what: &str) -> RecordError {
    RecordError::SourceFormat {
        sheet: record.source.sheet.clone(),
        code: Some(record.code.to_string()),
        field: None,
        reason: format!("no {} for this row", what),
    }
}

fn owned_text(record: &ExtractedRecord, key: FieldKey) -> Option<String> {
    record.text(key).map(str::to_string)
}

pub fn wage_record(
    record: &ExtractedRecord,
    opts: &NormalizeOptions,
) -> Result<WageBenchmarkRecord, RecordError> {
    let data_year = WAGE_YEAR_ORDER
        .iter()
        .filter(|k| record.fields.contains_key(*k))
        .find_map(|k| record.field_years.get(k).copied())
        .or(record.years.base)
        .or(opts.default_data_year)
        .ok_or_else(|| missing_year(record, "wage data year"))?;

    Ok(WageBenchmarkRecord {
        occupation_code: record.code.clone(),
        region: owned_text(record, FieldKey::Region).unwrap_or_else(|| opts.region.clone()),
        region_name: owned_text(record, FieldKey::RegionName)
            .unwrap_or_else(|| opts.region_name.clone()),
        data_year,
        mean_annual: record.measure(FieldKey::MeanAnnualWage),
        median_annual: record.measure(FieldKey::MedianAnnualWage),
        mean_hourly: record.measure(FieldKey::MeanHourlyWage),
        median_hourly: record.measure(FieldKey::MedianHourlyWage),
        benefit_annual: record.measure(FieldKey::BenefitAnnual),
    })
}

pub fn projection_record(
    record: &ExtractedRecord,
    opts: &NormalizeOptions,
) -> Result<ProjectionRecord, RecordError> {
    let base_year = record
        .years
        .base
        .or(opts.default_data_year)
        .ok_or_else(|| missing_year(record, "base year"))?;
    let projection_year = record
        .years
        .projection
        .ok_or_else(|| missing_year(record, "projection year"))?;

    let base = record.measure(FieldKey::BaseEmployment);
    let projected = record.measure(FieldKey::ProjectedEmployment);

    // derive what the sheet left out
    let mut change = record.measure(FieldKey::EmploymentChange);
    let mut percent = record.measure(FieldKey::EmploymentPercentChange);
    if let (Some(b), Some(p)) = (base.value(), projected.value()) {
        if change.is_missing() {
            change = Measure::Value(p - b);
        }
        if percent.is_missing() && b != 0.0 {
            percent = Measure::Value(((p - b) / b * 1000.0).round() / 10.0);
        }
    }

    Ok(ProjectionRecord {
        occupation_code: record.code.clone(),
        base_year,
        projection_year,
        base_employment: base,
        employment: projected,
        employment_change: change,
        employment_percent_change: percent,
        annual_openings: record.measure(FieldKey::AnnualOpenings),
        median_wage: record.measure(FieldKey::MedianAnnualWage),
        typical_education: owned_text(record, FieldKey::TypicalEducation),
        work_experience: owned_text(record, FieldKey::WorkExperience),
        on_job_training: owned_text(record, FieldKey::OnJobTraining),
        summary: owned_text(record, FieldKey::Summary),
        factors: owned_text(record, FieldKey::Factors),
    })
}

fn canonical_key(record: &ExtractedRecord) -> Option<FieldKey> {
    match record.table() {
        TableKind::Unclassified => UNCLASSIFIED_CANONICAL
            .iter()
            .copied()
            .find(|k| record.fields.contains_key(k)),
        kind => kind.canonical_field(),
    }
}

pub fn special_record(
    record: &ExtractedRecord,
    opts: &NormalizeOptions,
) -> Result<SpecialTableRecord, RecordError> {
    let canonical = canonical_key(record);
    let data_year = record
        .years
        .base
        .or_else(|| canonical.and_then(|k| record.field_years.get(&k).copied()))
        .or(opts.default_data_year)
        .ok_or_else(|| missing_year(record, "data year"))?;

    let mut bag = Map::new();
    if let Some(title) = &record.title {
        bag.insert(FieldKey::OccupationTitle.as_str().into(), Json::from(title.as_str()));
    }
    for (key, value) in &record.fields {
        if Some(*key) != canonical {
            bag.insert(key.as_str().into(), value.to_json());
        }
    }
    for (header, value) in &record.extras {
        bag.insert(header.clone(), value.to_json());
    }

    let table = &record.source.table;
    Ok(SpecialTableRecord {
        occupation_code: record.code.clone(),
        table_number: table.number.clone(),
        table_name: table.name.clone(),
        data_year,
        value: canonical.map(|k| record.measure(k)).unwrap_or(Measure::Missing),
        value_type: table.kind.slug().to_string(),
        additional_data: Json::Object(bag),
    })
}
