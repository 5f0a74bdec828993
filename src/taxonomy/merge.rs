// src/taxonomy/merge.rs

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

use super::code::SocCode;
use super::{DetailedOccupation, Taxonomy};
use crate::error::RecordError;
use crate::extract::{ExtractedRecord, SheetExtraction, TableKind};

/// Where on a detailed node a record is attached.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKey {
    Projection,
    Wage,
    /// Keyed by the table number as found in the workbook.
    Special(String),
}

/// What `attach` did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachOutcome {
    Attached,
    Replaced,
    Unchanged,
    /// The slot already holds data from a preferred sheet.
    Kept,
}

/// Slots a record feeds. A 1.2 row usually feeds both projection and wage.
pub fn slots_for(record: &ExtractedRecord) -> Vec<SlotKey> {
    let mut slots = Vec::new();
    let kind = record.table();
    if !kind.is_special() || kind == TableKind::Unclassified {
        if record.has_any(|k| k.is_projection()) {
            slots.push(SlotKey::Projection);
        }
        if record.has_any(|k| k.is_wage()) {
            slots.push(SlotKey::Wage);
        }
    }
    if kind.is_special() {
        slots.push(SlotKey::Special(record.source.table.number.clone()));
    }
    slots
}

/// Lower wins. Table 1.2 is the preferred source of projection data; all
/// other contenders tie and the first one seen stays.
fn priority(slot: &SlotKey, kind: TableKind) -> u8 {
    match (slot, kind) {
        (SlotKey::Projection, TableKind::Projections) => 0,
        _ => 1,
    }
}

impl Taxonomy {
    /// The only way data gets onto the tree.
    pub fn attach(
        &mut self,
        code: &SocCode,
        slot: SlotKey,
        record: &ExtractedRecord,
    ) -> Option<AttachOutcome> {
        let node = self.find_detailed_mut(code)?;
        Some(attach_to(node, slot, record))
    }
}

fn attach_to(
    node: &mut DetailedOccupation,
    slot: SlotKey,
    record: &ExtractedRecord,
) -> AttachOutcome {
    let outcome = match node.slots.get(&slot) {
        None => AttachOutcome::Attached,
        Some(existing) if existing == record => return AttachOutcome::Unchanged,
        Some(existing) if existing.source == record.source && existing.row == record.row => {
            AttachOutcome::Replaced
        }
        Some(existing) => {
            if priority(&slot, record.table()) < priority(&slot, existing.table()) {
                AttachOutcome::Replaced
            } else {
                return AttachOutcome::Kept;
            }
        }
    };
    node.slots.insert(slot, record.clone());
    outcome
}

/// Running tally of a merge across sheets.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub records: usize,
    pub attached: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub kept: usize,
    /// Summary rows for major, minor or broad groups.
    pub group_level: usize,
    /// Rows that fed no slot at all.
    pub empty: usize,
    pub orphan_codes: BTreeSet<SocCode>,
    #[serde(skip)]
    pub issues: Vec<RecordError>,
}

impl MergeReport {
    fn count(&mut self, outcome: AttachOutcome) {
        match outcome {
            AttachOutcome::Attached => self.attached += 1,
            AttachOutcome::Replaced => self.replaced += 1,
            AttachOutcome::Unchanged => self.unchanged += 1,
            AttachOutcome::Kept => self.kept += 1,
        }
    }
}

/// Attach every record of one sheet to the tree.
#[instrument(level = "info", skip_all, fields(sheet = %extraction.sheet))]
pub fn merge_sheet(
    taxonomy: &mut Taxonomy,
    extraction: &SheetExtraction,
    report: &mut MergeReport,
) {
    for record in &extraction.records {
        report.records += 1;

        let slots = slots_for(record);
        if slots.is_empty() {
            debug!(code = %record.code, "row carries no mergeable data");
            report.empty += 1;
            continue;
        }

        if taxonomy.find_detailed(&record.code).is_none() {
            if record.code.is_summary() || taxonomy.locate(&record.code).is_some() {
                report.group_level += 1;
            } else {
                warn!(sheet = %record.source.sheet, code = %record.code, "orphaned occupation code");
                report.orphan_codes.insert(record.code.clone());
                report.issues.push(RecordError::MergeOrphan {
                    sheet: record.source.sheet.clone(),
                    row: record.row,
                    code: record.code.to_string(),
                });
            }
            continue;
        }

        for slot in slots {
            if let Some(outcome) = taxonomy.attach(&record.code, slot, record) {
                report.count(outcome);
            }
        }
    }
    info!(
        attached = report.attached,
        replaced = report.replaced,
        kept = report.kept,
        orphans = report.orphan_codes.len(),
        "merged sheet"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{extract_sheet, ExtractOptions};
    use crate::sheet::columns::FieldKey;
    use crate::taxonomy::tests::sample;
    use crate::workbook::Sheet;

    fn extraction(name: &str, rows: &[Vec<&str>]) -> SheetExtraction {
        extract_sheet(&Sheet::from_strings(name, rows), &ExtractOptions::default()).unwrap()
    }

    fn projections() -> SheetExtraction {
        extraction(
            "Table 1.2",
            &[
                vec!["SOC code", "Occupation title", "Employment, 2023", "Employment, 2033", "Median annual wage, 2023"],
                vec!["15-0000", "Computer and mathematical", "5000", "5500", "100000"],
                vec!["15-2011", "Actuaries", "50", "65", "120000"],
                vec!["99-9999", "Mystery", "1", "2", "3"],
            ],
        )
    }

    fn fastest_growing() -> SheetExtraction {
        extraction(
            "Table 1.3",
            &[
                vec!["SOC code", "Occupation title", "Employment, 2023", "Employment, 2033", "Employment change, percent, 2023-33"],
                vec!["15-2011", "Actuaries", "40", "44", "10"],
                vec!["15-2041", "Statisticians", "30", "39", "30"],
            ],
        )
    }

    #[test]
    fn attaches_reports_orphans_and_group_rows() {
        let mut t = sample();
        let mut report = MergeReport::default();
        merge_sheet(&mut t, &projections(), &mut report);

        assert_eq!(report.records, 3);
        assert_eq!(report.group_level, 1);
        assert_eq!(report.orphan_codes.len(), 1);
        assert!(matches!(report.issues[0], RecordError::MergeOrphan { .. }));

        let actuaries = t.find_detailed(&SocCode::parse("15-2011").unwrap()).unwrap();
        assert!(actuaries.slot(&SlotKey::Projection).is_some());
        assert!(actuaries.slot(&SlotKey::Wage).is_some());
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let mut t = sample();
        let mut first = MergeReport::default();
        merge_sheet(&mut t, &projections(), &mut first);
        merge_sheet(&mut t, &fastest_growing(), &mut first);
        let snapshot = t.clone();

        let mut second = MergeReport::default();
        merge_sheet(&mut t, &projections(), &mut second);
        merge_sheet(&mut t, &fastest_growing(), &mut second);
        assert_eq!(t, snapshot);
        assert_eq!(second.attached + second.replaced, 0);
    }

    #[test]
    fn special_tables_get_their_own_slot() {
        let mut t = sample();
        let mut report = MergeReport::default();
        merge_sheet(&mut t, &fastest_growing(), &mut report);
        merge_sheet(&mut t, &projections(), &mut report);

        let actuaries = t.find_detailed(&SocCode::parse("15-2011").unwrap()).unwrap();
        let special = actuaries.slot(&SlotKey::Special("1.3".into())).unwrap();
        assert_eq!(special.measure(FieldKey::EmploymentPercentChange).value(), Some(10.0));
        // special tables never feed the projection slot
        let proj = actuaries.slot(&SlotKey::Projection).unwrap();
        assert_eq!(proj.table(), TableKind::Projections);
    }

    #[test]
    fn table_1_2_beats_other_projection_sources() {
        let other = extraction(
            "Table 9.9",
            &[
                vec!["SOC code", "Occupation title", "Employment, 2023", "Employment, 2033"],
                vec!["15-2011", "Actuaries", "1", "2"],
            ],
        );
        let mut t = sample();
        let mut report = MergeReport::default();
        merge_sheet(&mut t, &other, &mut report);
        merge_sheet(&mut t, &projections(), &mut report);

        let code = SocCode::parse("15-2011").unwrap();
        let proj = t.find_detailed(&code).unwrap().slot(&SlotKey::Projection).unwrap();
        assert_eq!(proj.table(), TableKind::Projections);

        // and once 1.2 holds the slot, a later contender is kept out
        merge_sheet(&mut t, &other, &mut report);
        let proj = t.find_detailed(&code).unwrap().slot(&SlotKey::Projection).unwrap();
        assert_eq!(proj.table(), TableKind::Projections);
        assert!(report.kept >= 1);
    }
}
