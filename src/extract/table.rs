// src/extract/table.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::sheet::columns::FieldKey;
use crate::workbook::Sheet;

static TABLE_IN_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btable\s*(\d{1,2}\.\d{1,2})\b").expect("static regex"));

static BARE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d{1,2}\.\d{1,2})\s*$").expect("static regex"));

/// Meaning of a BLS employment-projections table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    EmploymentByGroup,
    Projections,
    FastestGrowing,
    MostJobGrowth,
    FastestDeclining,
    LargestDeclines,
    MostOpenings,
    HighestPaying,
    Stem,
    EducationTraining,
    WageRanges,
    ReplacementNeeds,
    Unclassified,
}

/// Sort direction of a ranked category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RankOrder {
    Descending,
    Ascending,
}

impl RankOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            RankOrder::Descending => "DESC",
            RankOrder::Ascending => "ASC",
        }
    }
}

impl TableKind {
    pub const CLASSIFIED: [TableKind; 12] = [
        TableKind::EmploymentByGroup,
        TableKind::Projections,
        TableKind::FastestGrowing,
        TableKind::MostJobGrowth,
        TableKind::FastestDeclining,
        TableKind::LargestDeclines,
        TableKind::MostOpenings,
        TableKind::HighestPaying,
        TableKind::Stem,
        TableKind::EducationTraining,
        TableKind::WageRanges,
        TableKind::ReplacementNeeds,
    ];

    pub fn from_number(number: &str) -> TableKind {
        match number.trim() {
            "1.1" => TableKind::EmploymentByGroup,
            "1.2" => TableKind::Projections,
            "1.3" => TableKind::FastestGrowing,
            "1.4" => TableKind::MostJobGrowth,
            "1.5" => TableKind::FastestDeclining,
            "1.6" => TableKind::LargestDeclines,
            "1.7" => TableKind::MostOpenings,
            "1.8" => TableKind::HighestPaying,
            "1.9" => TableKind::Stem,
            "1.10" => TableKind::EducationTraining,
            "1.11" => TableKind::WageRanges,
            "1.12" => TableKind::ReplacementNeeds,
            _ => TableKind::Unclassified,
        }
    }

    pub fn number(&self) -> Option<&'static str> {
        Some(match self {
            TableKind::EmploymentByGroup => "1.1",
            TableKind::Projections => "1.2",
            TableKind::FastestGrowing => "1.3",
            TableKind::MostJobGrowth => "1.4",
            TableKind::FastestDeclining => "1.5",
            TableKind::LargestDeclines => "1.6",
            TableKind::MostOpenings => "1.7",
            TableKind::HighestPaying => "1.8",
            TableKind::Stem => "1.9",
            TableKind::EducationTraining => "1.10",
            TableKind::WageRanges => "1.11",
            TableKind::ReplacementNeeds => "1.12",
            TableKind::Unclassified => return None,
        })
    }

    /// Category tag stored as `value_type`.
    pub fn slug(&self) -> &'static str {
        match self {
            TableKind::EmploymentByGroup => "employment_by_group",
            TableKind::Projections => "projections",
            TableKind::FastestGrowing => "fastest_growing",
            TableKind::MostJobGrowth => "most_job_growth",
            TableKind::FastestDeclining => "fastest_declining",
            TableKind::LargestDeclines => "largest_declines",
            TableKind::MostOpenings => "most_openings",
            TableKind::HighestPaying => "highest_paying",
            TableKind::Stem => "stem",
            TableKind::EducationTraining => "education_training",
            TableKind::WageRanges => "wage_ranges",
            TableKind::ReplacementNeeds => "replacement_needs",
            TableKind::Unclassified => "unclassified",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TableKind::EmploymentByGroup => "Employment by major occupational group",
            TableKind::Projections => "Employment projections and worker characteristics",
            TableKind::FastestGrowing => "Fastest growing occupations",
            TableKind::MostJobGrowth => "Occupations with the most job growth",
            TableKind::FastestDeclining => "Fastest declining occupations",
            TableKind::LargestDeclines => "Occupations with the largest job declines",
            TableKind::MostOpenings => "Occupations with the most job openings",
            TableKind::HighestPaying => "Highest paying occupations",
            TableKind::Stem => "STEM occupations",
            TableKind::EducationTraining => "Education and training assignments",
            TableKind::WageRanges => "Occupations by wage range",
            TableKind::ReplacementNeeds => "Occupational separations and replacement needs",
            TableKind::Unclassified => "Unclassified table",
        }
    }

    /// 1.3 through 1.12, plus anything unrecognized.
    pub fn is_special(&self) -> bool {
        !matches!(self, TableKind::EmploymentByGroup | TableKind::Projections)
    }

    /// The field whose value becomes the special table's canonical `value`.
    pub fn canonical_field(&self) -> Option<FieldKey> {
        match self {
            TableKind::FastestGrowing | TableKind::FastestDeclining => {
                Some(FieldKey::EmploymentPercentChange)
            }
            TableKind::MostJobGrowth | TableKind::LargestDeclines => {
                Some(FieldKey::EmploymentChange)
            }
            TableKind::MostOpenings | TableKind::ReplacementNeeds => {
                Some(FieldKey::AnnualOpenings)
            }
            TableKind::HighestPaying | TableKind::WageRanges => Some(FieldKey::MedianAnnualWage),
            TableKind::Stem | TableKind::EducationTraining => Some(FieldKey::BaseEmployment),
            TableKind::EmploymentByGroup | TableKind::Projections | TableKind::Unclassified => None,
        }
    }

    /// Categories that get a ranking view, and their direction.
    pub fn rank_order(&self) -> Option<RankOrder> {
        match self {
            TableKind::FastestGrowing
            | TableKind::MostJobGrowth
            | TableKind::MostOpenings
            | TableKind::HighestPaying => Some(RankOrder::Descending),
            TableKind::FastestDeclining | TableKind::LargestDeclines => Some(RankOrder::Ascending),
            _ => None,
        }
    }
}

/// A sheet's declared table: its literal number plus the classification.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableId {
    pub number: String,
    pub kind: TableKind,
    pub name: String,
}

impl TableId {
    pub fn from_number(number: &str) -> Self {
        let kind = TableKind::from_number(number);
        Self {
            number: number.trim().to_string(),
            kind,
            name: kind.display_name().to_string(),
        }
    }
}

/// Read the table identifier from the sheet name, else from the rows above
/// the header. Sheets without one are kept as `Unclassified` under their name.
pub fn identify_table(sheet: &Sheet, header_row: usize) -> TableId {
    let from_name = TABLE_IN_TEXT
        .captures(&sheet.name)
        .or_else(|| BARE_NUMBER.captures(&sheet.name))
        .map(|c| c[1].to_string());

    let title = (0..header_row)
        .map(|i| sheet.row_texts(i).join(" "))
        .find(|t| !t.trim().is_empty());

    let from_title = || {
        (0..header_row).find_map(|i| {
            let text = sheet.row_texts(i).join(" ");
            TABLE_IN_TEXT.captures(&text).map(|c| c[1].to_string())
        })
    };

    match from_name.or_else(from_title) {
        Some(number) => {
            let mut id = TableId::from_number(&number);
            if id.kind == TableKind::Unclassified {
                id.name = title.unwrap_or_else(|| sheet.name.clone());
            }
            id
        }
        None => TableId {
            number: sheet.name.clone(),
            kind: TableKind::Unclassified,
            name: title.unwrap_or_else(|| sheet.name.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_twelve_numbers_classify() {
        for kind in TableKind::CLASSIFIED {
            let n = kind.number().unwrap();
            assert_eq!(TableKind::from_number(n), kind);
        }
        assert_eq!(TableKind::from_number("2.4"), TableKind::Unclassified);
    }

    #[test]
    fn number_from_sheet_name_or_title() {
        let s = Sheet::from_strings("Table 1.10", &[vec!["SOC code", "Title", "Employment, 2023"]]);
        assert_eq!(identify_table(&s, 0).kind, TableKind::EducationTraining);

        let s = Sheet::from_strings("1.3", &[]);
        assert_eq!(identify_table(&s, 0).kind, TableKind::FastestGrowing);

        let s = Sheet::from_strings(
            "Sheet4",
            &[
                vec!["Table 1.7 Occupations with the most job openings, 2023-33"],
                vec!["SOC code", "Title", "Openings"],
            ],
        );
        let id = identify_table(&s, 1);
        assert_eq!(id.kind, TableKind::MostOpenings);
        assert_eq!(id.number, "1.7");
    }

    #[test]
    fn unknown_tables_keep_their_title() {
        let s = Sheet::from_strings(
            "Table 5.2",
            &[vec!["Table 5.2 Occupational separations"], vec!["SOC code", "x", "y"]],
        );
        let id = identify_table(&s, 1);
        assert_eq!(id.kind, TableKind::Unclassified);
        assert_eq!(id.number, "5.2");
        assert_eq!(id.name, "Table 5.2 Occupational separations");
        assert!(id.kind.is_special());
    }

    #[test]
    fn decline_categories_rank_ascending() {
        assert_eq!(TableKind::FastestDeclining.rank_order(), Some(RankOrder::Ascending));
        assert_eq!(TableKind::FastestGrowing.rank_order(), Some(RankOrder::Descending));
        assert_eq!(TableKind::Stem.rank_order(), None);
    }
}
