// src/normalize/mod.rs
//! Walks the merged tree, turns each attached record into table rows and
//! writes them through an [`OccupationStore`].

pub mod records;

pub use records::{
    projection_record, special_record, wage_record, NormalizeOptions, ProjectionRecord,
    SpecialTableRecord, WageBenchmarkRecord,
};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::error::{RecordError, StoreError};
use crate::store::OccupationStore;
use crate::taxonomy::merge::SlotKey;
use crate::taxonomy::Taxonomy;

/// Rows produced from one tree walk, before persistence.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub wages: Vec<WageBenchmarkRecord>,
    pub projections: Vec<ProjectionRecord>,
    pub specials: Vec<SpecialTableRecord>,
    pub issues: Vec<RecordError>,
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.wages.len() + self.projections.len() + self.specials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UpsertReport {
    pub occupations: usize,
    pub wages: usize,
    pub projections: usize,
    pub specials: usize,
    pub failed: usize,
    #[serde(skip)]
    pub issues: Vec<RecordError>,
}

impl UpsertReport {
    pub fn persisted(&self) -> usize {
        self.wages + self.projections + self.specials
    }

    fn failure(&mut self, table: &'static str, key: String, err: StoreError) {
        warn!(table, key = %key, error = %err, "upsert failed, skipping record");
        self.failed += 1;
        self.issues.push(RecordError::Persistence {
            table,
            key,
            reason: err.to_string(),
        });
    }
}

/// Build rows for every detailed node that has data attached.
pub fn normalize_tree(taxonomy: &Taxonomy, opts: &NormalizeOptions) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for node in taxonomy.detailed().filter(|d| d.has_data()) {
        for (slot, record) in node.slots() {
            let result = match slot {
                SlotKey::Wage => wage_record(record, opts).map(|r| batch.wages.push(r)),
                SlotKey::Projection => {
                    projection_record(record, opts).map(|r| batch.projections.push(r))
                }
                SlotKey::Special(_) => special_record(record, opts).map(|r| batch.specials.push(r)),
            };
            if let Err(e) = result {
                warn!(code = %node.code, error = %e, "record not normalized");
                batch.issues.push(e);
            }
        }
    }
    batch
}

/// Load every taxonomy node into `occupations`.
pub fn upsert_occupations(
    taxonomy: &Taxonomy,
    store: &dyn OccupationStore,
    report: &mut UpsertReport,
) {
    for row in taxonomy.occupation_rows() {
        match store.upsert_occupation(&row) {
            Ok(()) => report.occupations += 1,
            Err(e) => report.failure("occupations", row.code.to_string(), e),
        }
    }
}

/// Persist a batch, one keyed upsert per row. A failing row is reported and
/// the rest still go through.
pub fn persist_batch(batch: &NormalizedBatch, store: &dyn OccupationStore, report: &mut UpsertReport) {
    for r in &batch.wages {
        match store.upsert_wage(r) {
            Ok(()) => report.wages += 1,
            Err(e) => report.failure(
                "occupation_data",
                format!("{}/{}/{}", r.occupation_code, r.region, r.data_year),
                e,
            ),
        }
    }
    for r in &batch.projections {
        match store.upsert_projection(r) {
            Ok(()) => report.projections += 1,
            Err(e) => report.failure(
                "projections",
                format!("{}/{}/{}", r.occupation_code, r.base_year, r.projection_year),
                e,
            ),
        }
    }
    for r in &batch.specials {
        match store.upsert_special(r) {
            Ok(()) => report.specials += 1,
            Err(e) => report.failure(
                "bls_special_tables",
                format!("{}/{}/{}", r.occupation_code, r.table_number, r.data_year),
                e,
            ),
        }
    }
}

/// Normalize the merged tree and write it out.
#[instrument(level = "info", skip_all)]
pub fn normalize_and_upsert(
    taxonomy: &Taxonomy,
    opts: &NormalizeOptions,
    store: &dyn OccupationStore,
) -> UpsertReport {
    let batch = normalize_tree(taxonomy, opts);
    let mut report = UpsertReport {
        issues: batch.issues.clone(),
        ..Default::default()
    };
    persist_batch(&batch, store, &mut report);
    info!(
        wages = report.wages,
        projections = report.projections,
        specials = report.specials,
        failed = report.failed,
        "upserted records"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_sheet, ExtractOptions, Measure};
    use crate::store::RunRecord;
    use crate::taxonomy::merge::{merge_sheet, MergeReport};
    use crate::taxonomy::tests::sample;
    use crate::workbook::Sheet;

    struct FailingStore;

    impl OccupationStore for FailingStore {
        fn upsert_occupation(&self, _: &crate::taxonomy::OccupationRow) -> Result<(), StoreError> {
            Ok(())
        }
        fn upsert_wage(&self, _: &WageBenchmarkRecord) -> Result<(), StoreError> {
            Err(StoreError::Json(serde_json::from_str::<u8>("x").unwrap_err()))
        }
        fn upsert_projection(&self, _: &ProjectionRecord) -> Result<(), StoreError> {
            Ok(())
        }
        fn upsert_special(&self, _: &SpecialTableRecord) -> Result<(), StoreError> {
            Ok(())
        }
        fn refresh_rankings(&self) -> Result<Vec<String>, StoreError> {
            Ok(vec![])
        }
        fn record_run(&self, _: &RunRecord) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn merged() -> Taxonomy {
        let sheet = Sheet::from_strings(
            "Table 1.2",
            &[
                vec!["SOC code", "Occupation title", "Employment, 2023", "Employment, 2033", "Median annual wage, 2023"],
                vec!["15-2011", "Actuaries", "50", "65", "120000"],
                vec!["15-2041", "Statisticians", "30", "40", "*"],
            ],
        );
        let ex = extract_sheet(&sheet, &ExtractOptions::default()).unwrap();
        let mut t = sample();
        merge_sheet(&mut t, &ex, &mut MergeReport::default());
        t
    }

    #[test]
    fn tree_walk_emits_rows_per_slot() {
        let batch = normalize_tree(&merged(), &NormalizeOptions::default());
        assert_eq!(batch.projections.len(), 2);
        assert_eq!(batch.wages.len(), 2);
        assert!(batch.specials.is_empty());
        let stats = batch
            .wages
            .iter()
            .find(|w| w.occupation_code.as_str() == "15-2041")
            .unwrap();
        assert_eq!(stats.median_annual, Measure::Suppressed("*".into()));
    }

    #[test]
    fn failing_upserts_are_reported_not_fatal() {
        let report = normalize_and_upsert(&merged(), &NormalizeOptions::default(), &FailingStore);
        assert_eq!(report.projections, 2);
        assert_eq!(report.wages, 0);
        assert_eq!(report.failed, 2);
        assert!(report
            .issues
            .iter()
            .all(|i| matches!(i, RecordError::Persistence { table: "occupation_data", .. })));
    }
}
