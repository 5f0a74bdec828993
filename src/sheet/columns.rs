// src/sheet/columns.rs
//! Maps literal header strings onto a closed set of semantic field keys.
//!
//! Each key owns an ordered list of patterns. For a key, the patterns are
//! tried in order against the headers from left to right, and the first header
//! that matches binds the key. Patterns never mention a concrete year, so
//! "Employment, 2023" and "Employment, 2031" bind the same way.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Semantic fields the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    OccupationCode,
    OccupationTitle,
    OccupationType,
    Region,
    RegionName,
    /// Year-bearing employment column; resolved into base/projected by year.
    Employment,
    BaseEmployment,
    ProjectedEmployment,
    EmploymentChange,
    EmploymentPercentChange,
    AnnualOpenings,
    MedianAnnualWage,
    MeanAnnualWage,
    MedianHourlyWage,
    MeanHourlyWage,
    BenefitAnnual,
    TypicalEducation,
    WorkExperience,
    OnJobTraining,
    Summary,
    Factors,
}

impl FieldKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::OccupationCode => "occupation_code",
            FieldKey::OccupationTitle => "occupation_title",
            FieldKey::OccupationType => "occupation_type",
            FieldKey::Region => "region",
            FieldKey::RegionName => "region_name",
            FieldKey::Employment => "employment",
            FieldKey::BaseEmployment => "base_employment",
            FieldKey::ProjectedEmployment => "projected_employment",
            FieldKey::EmploymentChange => "employment_change",
            FieldKey::EmploymentPercentChange => "employment_percent_change",
            FieldKey::AnnualOpenings => "annual_openings",
            FieldKey::MedianAnnualWage => "median_annual_wage",
            FieldKey::MeanAnnualWage => "mean_annual_wage",
            FieldKey::MedianHourlyWage => "median_hourly_wage",
            FieldKey::MeanHourlyWage => "mean_hourly_wage",
            FieldKey::BenefitAnnual => "benefit_annual",
            FieldKey::TypicalEducation => "typical_education",
            FieldKey::WorkExperience => "work_experience",
            FieldKey::OnJobTraining => "on_job_training",
            FieldKey::Summary => "summary",
            FieldKey::Factors => "factors",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldKey::Employment
                | FieldKey::BaseEmployment
                | FieldKey::ProjectedEmployment
                | FieldKey::EmploymentChange
                | FieldKey::EmploymentPercentChange
                | FieldKey::AnnualOpenings
                | FieldKey::MedianAnnualWage
                | FieldKey::MeanAnnualWage
                | FieldKey::MedianHourlyWage
                | FieldKey::MeanHourlyWage
                | FieldKey::BenefitAnnual
        )
    }

    pub fn is_wage(&self) -> bool {
        matches!(
            self,
            FieldKey::MedianAnnualWage
                | FieldKey::MeanAnnualWage
                | FieldKey::MedianHourlyWage
                | FieldKey::MeanHourlyWage
                | FieldKey::BenefitAnnual
        )
    }

    /// Fields that make a row carry projection-style data.
    pub fn is_projection(&self) -> bool {
        matches!(
            self,
            FieldKey::BaseEmployment
                | FieldKey::ProjectedEmployment
                | FieldKey::EmploymentChange
                | FieldKey::EmploymentPercentChange
                | FieldKey::AnnualOpenings
        )
    }
}

struct Pattern {
    include: Regex,
    exclude: Option<Regex>,
}

impl Pattern {
    fn new(include: &str, exclude: Option<&str>) -> Self {
        Self {
            include: Regex::new(&format!("(?i){}", include)).expect("static regex"),
            exclude: exclude.map(|e| Regex::new(&format!("(?i){}", e)).expect("static regex")),
        }
    }

    fn is_match(&self, header: &str) -> bool {
        self.include.is_match(header)
            && !self.exclude.as_ref().map_or(false, |x| x.is_match(header))
    }
}

/// Declaration order is significant: a header bound by an earlier key is not
/// offered to later keys.
static FIELD_PATTERNS: Lazy<Vec<(FieldKey, Vec<Pattern>)>> = Lazy::new(|| {
    use FieldKey::*;
    vec![
        (
            OccupationCode,
            vec![
                Pattern::new(r"matrix\s+code", None),
                Pattern::new(r"\bsoc\s+code", None),
                Pattern::new(r"occupation(al)?\s+code", None),
                Pattern::new(r"^(soc|code)$", None),
            ],
        ),
        (
            OccupationTitle,
            vec![
                Pattern::new(r"matrix\s+title", None),
                Pattern::new(r"occupation(al)?\s+(title|name)", None),
                Pattern::new(r"^((19|20)\d{2}\s+)?occupations?$", None),
                Pattern::new(r"^title$", None),
            ],
        ),
        (OccupationType, vec![Pattern::new(r"occupation\s+type", None)]),
        (
            RegionName,
            vec![Pattern::new(r"^(area|region|state)\s+(name|title)$", None)],
        ),
        (
            Region,
            vec![Pattern::new(r"^(area|region|state)(\s+code)?$", None)],
        ),
        (
            Employment,
            vec![
                Pattern::new(
                    r"^employment\b[^a-z]*\b(19|20)\d{2}\b",
                    Some(r"change|percent|distribution|share"),
                ),
                Pattern::new(
                    r"\bemployment\b.*\b(19|20)\d{2}\b",
                    Some(r"change|percent|distribution|share|self|wage"),
                ),
            ],
        ),
        (
            EmploymentChange,
            vec![
                Pattern::new(r"change.*\bnumeric\b", None),
                Pattern::new(r"\bnumeric\b.*change", None),
                Pattern::new(r"change.*\bnumber\b", Some(r"percent")),
            ],
        ),
        (
            EmploymentPercentChange,
            vec![
                Pattern::new(r"change.*\bpercent\b", None),
                Pattern::new(r"\bpercent\b.*change", None),
                Pattern::new(r"^percent\s+growth", None),
            ],
        ),
        (
            AnnualOpenings,
            vec![
                Pattern::new(r"occupational\s+openings", None),
                Pattern::new(r"\bopenings\b", Some(r"percent")),
            ],
        ),
        (
            MedianHourlyWage,
            vec![Pattern::new(r"median\s+hourly", None)],
        ),
        (
            MeanHourlyWage,
            vec![Pattern::new(r"(mean|average)\s+hourly", None)],
        ),
        (
            MedianAnnualWage,
            vec![
                Pattern::new(r"median\s+annual\s+wage", None),
                Pattern::new(r"^median\s+wage", None),
                Pattern::new(r"median.*\bwage", Some(r"hourly")),
            ],
        ),
        (
            MeanAnnualWage,
            vec![
                Pattern::new(r"(mean|average)\s+annual\s+wage", None),
                Pattern::new(r"^(mean|average)\s+wage", Some(r"hourly")),
            ],
        ),
        (
            BenefitAnnual,
            vec![Pattern::new(r"\bbenefits?\b", None)],
        ),
        (
            TypicalEducation,
            vec![
                Pattern::new(r"typical\s+education", None),
                Pattern::new(r"education\s+needed", None),
                Pattern::new(r"^education\b", Some(r"percent")),
            ],
        ),
        (
            WorkExperience,
            vec![Pattern::new(r"work\s+experience", None)],
        ),
        (
            OnJobTraining,
            vec![
                Pattern::new(r"on[- ]the[- ]job\s+training", None),
                Pattern::new(r"\btraining\b", Some(r"education|experience")),
            ],
        ),
        (
            Summary,
            vec![
                Pattern::new(r"^(job\s+)?summary", None),
                Pattern::new(r"^description", None),
            ],
        ),
        (Factors, vec![Pattern::new(r"\bfactors?\b", None)]),
    ]
});

/// Collapse whitespace and unify dash variants so patterns see one spelling.
pub fn normalize_header(raw: &str) -> String {
    let unified: String = raw
        .chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            '\u{00a0}' => ' ',
            other => other,
        })
        .collect();
    unified.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One header cell: its column index and literal text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnBinding {
    pub index: usize,
    pub header: String,
}

/// Result of matching one sheet's header row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldMapping {
    bindings: BTreeMap<FieldKey, ColumnBinding>,
    /// Every header matching the year-employment patterns, left to right.
    employment_candidates: Vec<ColumnBinding>,
    unmapped: Vec<ColumnBinding>,
}

impl FieldMapping {
    pub fn get(&self, key: FieldKey) -> Option<&ColumnBinding> {
        self.bindings.get(&key)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.bindings.contains_key(&key)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&FieldKey, &ColumnBinding)> {
        self.bindings.iter()
    }

    pub fn employment_candidates(&self) -> &[ColumnBinding] {
        &self.employment_candidates
    }

    pub fn unmapped(&self) -> &[ColumnBinding] {
        &self.unmapped
    }

    /// Record a key resolved after matching (base/projected employment).
    pub fn bind(&mut self, key: FieldKey, binding: ColumnBinding) {
        self.bindings.insert(key, binding);
    }
}

/// Match a header row. `headers` holds one entry per column, blank ones included.
pub fn match_columns(headers: &[String]) -> FieldMapping {
    let normalized: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (i, normalize_header(h)))
        .filter(|(_, h)| !h.is_empty())
        .collect();

    let mut mapping = FieldMapping::default();
    let mut taken: BTreeSet<usize> = BTreeSet::new();

    for (key, patterns) in FIELD_PATTERNS.iter() {
        if *key == FieldKey::Employment {
            for (idx, h) in &normalized {
                if taken.contains(idx) {
                    continue;
                }
                if patterns.iter().any(|p| p.is_match(h)) {
                    trace!(header = %h, "employment candidate");
                    mapping.employment_candidates.push(ColumnBinding {
                        index: *idx,
                        header: h.clone(),
                    });
                    taken.insert(*idx);
                }
            }
            continue;
        }

        'patterns: for pattern in patterns {
            for (idx, h) in &normalized {
                if taken.contains(idx) {
                    continue;
                }
                if pattern.is_match(h) {
                    trace!(key = key.as_str(), header = %h, "bound column");
                    mapping.bindings.insert(
                        *key,
                        ColumnBinding {
                            index: *idx,
                            header: h.clone(),
                        },
                    );
                    taken.insert(*idx);
                    break 'patterns;
                }
            }
        }
    }

    mapping.unmapped = normalized
        .into_iter()
        .filter(|(i, _)| !taken.contains(i))
        .map(|(index, header)| ColumnBinding { index, header })
        .collect();
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn year_drift_binds_the_same_key() {
        for year in [2019, 2023, 2024, 2031, 2033] {
            let h = headers(&["SOC code", &format!("Employment, {}", year)]);
            let m = match_columns(&h);
            assert_eq!(m.employment_candidates().len(), 1, "year {}", year);
            assert_eq!(m.employment_candidates()[0].index, 1);

            let h = headers(&["SOC code", &format!("Median annual wage, {}(1)", year)]);
            let m = match_columns(&h);
            assert_eq!(m.get(FieldKey::MedianAnnualWage).unwrap().index, 1);
        }
    }

    #[test]
    fn bls_table_1_2_header_row() {
        let h = headers(&[
            "2023 National Employment Matrix title",
            "2023 National Employment Matrix code",
            "Occupation type",
            "Employment, 2023",
            "Employment, 2033",
            "Employment distribution, percent, 2023",
            "Employment change, numeric, 2023\u{2013}33",
            "Employment change, percent, 2023\u{2013}33",
            "Percent self employed, 2023",
            "Occupational openings, 2023\u{2013}33 annual average",
            "Median annual wage, dollars, 2023(1)",
            "Typical education needed for entry",
            "Work experience in a related occupation",
            "Typical on-the-job training needed to attain competency in the occupation",
        ]);
        let m = match_columns(&h);

        assert_eq!(m.get(FieldKey::OccupationTitle).unwrap().index, 0);
        assert_eq!(m.get(FieldKey::OccupationCode).unwrap().index, 1);
        assert_eq!(m.get(FieldKey::OccupationType).unwrap().index, 2);
        let cands: Vec<usize> = m.employment_candidates().iter().map(|c| c.index).collect();
        assert_eq!(cands, vec![3, 4]);
        assert_eq!(m.get(FieldKey::EmploymentChange).unwrap().index, 6);
        assert_eq!(m.get(FieldKey::EmploymentPercentChange).unwrap().index, 7);
        assert_eq!(m.get(FieldKey::AnnualOpenings).unwrap().index, 9);
        assert_eq!(m.get(FieldKey::MedianAnnualWage).unwrap().index, 10);
        assert_eq!(m.get(FieldKey::TypicalEducation).unwrap().index, 11);
        assert_eq!(m.get(FieldKey::WorkExperience).unwrap().index, 12);
        assert_eq!(m.get(FieldKey::OnJobTraining).unwrap().index, 13);

        let unmapped: Vec<usize> = m.unmapped().iter().map(|c| c.index).collect();
        assert_eq!(unmapped, vec![5, 8]);
    }

    #[test]
    fn first_match_wins_per_key() {
        let h = headers(&["Occupation code", "SOC code", "Title"]);
        let m = match_columns(&h);
        // "soc code" is the earlier pattern, so it binds even though it is further right
        assert_eq!(m.get(FieldKey::OccupationCode).unwrap().index, 1);
        assert_eq!(m.get(FieldKey::OccupationTitle).unwrap().index, 2);
    }

    #[test]
    fn hourly_and_annual_wages_stay_apart() {
        let h = headers(&[
            "SOC code",
            "Mean hourly wage",
            "Median hourly wage",
            "Mean annual wage",
            "Median annual wage",
            "Average annual benefit",
        ]);
        let m = match_columns(&h);
        assert_eq!(m.get(FieldKey::MeanHourlyWage).unwrap().index, 1);
        assert_eq!(m.get(FieldKey::MedianHourlyWage).unwrap().index, 2);
        assert_eq!(m.get(FieldKey::MeanAnnualWage).unwrap().index, 3);
        assert_eq!(m.get(FieldKey::MedianAnnualWage).unwrap().index, 4);
        assert_eq!(m.get(FieldKey::BenefitAnnual).unwrap().index, 5);
    }

    #[test]
    fn normalize_unifies_dashes_and_spaces() {
        assert_eq!(
            normalize_header("Employment change,\n percent, 2023\u{2014}33"),
            "Employment change, percent, 2023-33"
        );
    }
}
