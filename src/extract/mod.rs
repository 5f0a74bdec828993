// src/extract/mod.rs
//! Turns analyzed sheets into typed records keyed by occupation code.

pub mod record;
pub mod table;
pub mod value;

pub use record::{extract_sheet, ExtractOptions, ExtractedRecord, SheetExtraction, SheetSource};
pub use table::{identify_table, RankOrder, TableId, TableKind};
pub use value::{FieldValue, Measure, MeasureFlag, NumberParser};
