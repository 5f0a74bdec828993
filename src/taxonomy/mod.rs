// src/taxonomy/mod.rs
//! The occupation hierarchy: major group → minor group → broad occupation →
//! detailed occupation. Built once from the taxonomy JSON; afterwards only
//! [`merge`] attaches extracted records to detailed nodes.

pub mod code;
pub mod merge;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
};
use tracing::{info, instrument};

use crate::error::FatalError;
use crate::extract::ExtractedRecord;
use code::SocCode;
use merge::SlotKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyLevel {
    Major,
    Minor,
    Broad,
    Detailed,
}

impl HierarchyLevel {
    /// Stored as `occupations.occupation_type`.
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Major => "Major",
            HierarchyLevel::Minor => "Minor",
            HierarchyLevel::Broad => "Broad",
            HierarchyLevel::Detailed => "Detailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MajorGroup {
    pub code: SocCode,
    pub name: String,
    pub minors: Vec<MinorGroup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinorGroup {
    pub code: SocCode,
    pub name: String,
    pub broads: Vec<BroadOccupation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BroadOccupation {
    pub code: SocCode,
    pub name: String,
    pub detailed: Vec<DetailedOccupation>,
}

/// Leaf node. Extracted records hang off it, one per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailedOccupation {
    pub code: SocCode,
    pub name: String,
    slots: BTreeMap<SlotKey, ExtractedRecord>,
}

impl DetailedOccupation {
    fn new(code: SocCode, name: String) -> Self {
        Self {
            code,
            name,
            slots: BTreeMap::new(),
        }
    }

    pub fn slots(&self) -> &BTreeMap<SlotKey, ExtractedRecord> {
        &self.slots
    }

    pub fn slot(&self, key: &SlotKey) -> Option<&ExtractedRecord> {
        self.slots.get(key)
    }

    pub fn has_data(&self) -> bool {
        !self.slots.is_empty()
    }
}

/// One row of the `occupations` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupationRow {
    pub code: SocCode,
    pub name: String,
    pub major_group_code: SocCode,
    pub occupation_type: HierarchyLevel,
}

// JSON shape: {major: {name, minor_groups: {minor: {name, broad_occupations: …}}}}
#[derive(Debug, Deserialize)]
struct RawMajor {
    name: String,
    #[serde(default)]
    minor_groups: BTreeMap<String, RawMinor>,
}

#[derive(Debug, Deserialize)]
struct RawMinor {
    name: String,
    #[serde(default)]
    broad_occupations: BTreeMap<String, RawBroad>,
}

#[derive(Debug, Deserialize)]
struct RawBroad {
    name: String,
    #[serde(default)]
    detailed_occupations: BTreeMap<String, RawDetailed>,
}

#[derive(Debug, Deserialize)]
struct RawDetailed {
    name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Taxonomy {
    majors: Vec<MajorGroup>,
}

impl Taxonomy {
    /// Load the taxonomy document; any failure here is fatal for the run.
    #[instrument(level = "info", skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, FatalError> {
        let taxonomy = fs::read_to_string(path)
            .with_context(|| format!("reading taxonomy {:?}", path))
            .and_then(|t| Self::from_json_str(&t))
            .map_err(|e| FatalError::Taxonomy {
                path: path.to_path_buf(),
                reason: format!("{:#}", e),
            })?;
        info!(
            majors = taxonomy.majors.len(),
            detailed = taxonomy.detailed_count(),
            "loaded taxonomy"
        );
        Ok(taxonomy)
    }

    /// Parse and validate a taxonomy document. Children come out sorted by code.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawMajor> =
            serde_json::from_str(json).context("parsing taxonomy JSON")?;

        let mut seen: BTreeSet<SocCode> = BTreeSet::new();
        let mut checked = |raw: &str| -> Result<SocCode> {
            let code = SocCode::parse(raw)
                .with_context(|| format!("`{}` is not a valid occupation code", raw))?;
            if !seen.insert(code.clone()) {
                bail!("occupation code {} appears twice", code);
            }
            Ok(code)
        };

        let mut majors = Vec::with_capacity(raw.len());
        for (major_code, major) in raw {
            let mut minors = Vec::with_capacity(major.minor_groups.len());
            for (minor_code, minor) in major.minor_groups {
                let mut broads = Vec::with_capacity(minor.broad_occupations.len());
                for (broad_code, broad) in minor.broad_occupations {
                    let mut detailed = Vec::with_capacity(broad.detailed_occupations.len());
                    for (code, leaf) in broad.detailed_occupations {
                        detailed.push(DetailedOccupation::new(checked(&code)?, leaf.name));
                    }
                    broads.push(BroadOccupation {
                        code: checked(&broad_code)?,
                        name: broad.name,
                        detailed,
                    });
                }
                minors.push(MinorGroup {
                    code: checked(&minor_code)?,
                    name: minor.name,
                    broads,
                });
            }
            majors.push(MajorGroup {
                code: checked(&major_code)?,
                name: major.name,
                minors,
            });
        }
        Ok(Taxonomy { majors })
    }

    pub fn majors(&self) -> &[MajorGroup] {
        &self.majors
    }

    pub fn detailed(&self) -> impl Iterator<Item = &DetailedOccupation> {
        self.majors
            .iter()
            .flat_map(|m| m.minors.iter())
            .flat_map(|n| n.broads.iter())
            .flat_map(|b| b.detailed.iter())
    }

    pub fn detailed_count(&self) -> usize {
        self.detailed().count()
    }

    /// Depth-first lookup of a detailed node.
    pub fn find_detailed(&self, code: &SocCode) -> Option<&DetailedOccupation> {
        self.detailed().find(|d| &d.code == code)
    }

    pub(crate) fn find_detailed_mut(&mut self, code: &SocCode) -> Option<&mut DetailedOccupation> {
        for major in &mut self.majors {
            for minor in &mut major.minors {
                for broad in &mut minor.broads {
                    if let Some(d) = broad.detailed.iter_mut().find(|d| &d.code == code) {
                        return Some(d);
                    }
                }
            }
        }
        None
    }

    /// Level of the node carrying `code`, if the code is in the tree at all.
    pub fn locate(&self, code: &SocCode) -> Option<HierarchyLevel> {
        for major in &self.majors {
            if &major.code == code {
                return Some(HierarchyLevel::Major);
            }
            for minor in &major.minors {
                if &minor.code == code {
                    return Some(HierarchyLevel::Minor);
                }
                for broad in &minor.broads {
                    if &broad.code == code {
                        return Some(HierarchyLevel::Broad);
                    }
                    if broad.detailed.iter().any(|d| &d.code == code) {
                        return Some(HierarchyLevel::Detailed);
                    }
                }
            }
        }
        None
    }

    /// Every node flattened into `occupations` rows, parents before children.
    pub fn occupation_rows(&self) -> Vec<OccupationRow> {
        let mut rows = Vec::new();
        for major in &self.majors {
            let row = |code: &SocCode, name: &str, level| OccupationRow {
                code: code.clone(),
                name: name.to_string(),
                major_group_code: major.code.clone(),
                occupation_type: level,
            };
            rows.push(row(&major.code, &major.name, HierarchyLevel::Major));
            for minor in &major.minors {
                rows.push(row(&minor.code, &minor.name, HierarchyLevel::Minor));
                for broad in &minor.broads {
                    rows.push(row(&broad.code, &broad.name, HierarchyLevel::Broad));
                    for d in &broad.detailed {
                        rows.push(row(&d.code, &d.name, HierarchyLevel::Detailed));
                    }
                }
            }
        }
        rows
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
        "15-0000": {
            "name": "Computer and Mathematical Occupations",
            "minor_groups": {
                "15-2000": {
                    "name": "Mathematical Science Occupations",
                    "broad_occupations": {
                        "15-2010": {
                            "name": "Actuaries",
                            "detailed_occupations": { "15-2011": { "name": "Actuaries" } }
                        },
                        "15-2040": {
                            "name": "Statisticians",
                            "detailed_occupations": { "15-2041": { "name": "Statisticians" } }
                        }
                    }
                },
                "15-1200": {
                    "name": "Computer Occupations",
                    "broad_occupations": {
                        "15-1250": {
                            "name": "Software and Web Developers, Programmers, and Testers",
                            "detailed_occupations": {
                                "15-1252": { "name": "Software Developers" },
                                "15-1253": { "name": "Software Quality Assurance Analysts and Testers" }
                            }
                        }
                    }
                }
            }
        }
    }"#;

    pub(crate) fn sample() -> Taxonomy {
        Taxonomy::from_json_str(SAMPLE).unwrap()
    }

    #[test]
    fn loads_and_sorts_children() {
        let t = sample();
        assert_eq!(t.majors().len(), 1);
        let minors: Vec<&str> = t.majors()[0].minors.iter().map(|m| m.code.as_str()).collect();
        assert_eq!(minors, vec!["15-1200", "15-2000"]);
        assert_eq!(t.detailed_count(), 4);
    }

    #[test]
    fn locate_reports_levels() {
        let t = sample();
        let code = |s: &str| SocCode::parse(s).unwrap();
        assert_eq!(t.locate(&code("15-0000")), Some(HierarchyLevel::Major));
        assert_eq!(t.locate(&code("15-2000")), Some(HierarchyLevel::Minor));
        assert_eq!(t.locate(&code("15-2010")), Some(HierarchyLevel::Broad));
        assert_eq!(t.locate(&code("15-2011")), Some(HierarchyLevel::Detailed));
        assert_eq!(t.locate(&code("99-9999")), None);
        assert!(t.find_detailed(&code("15-1252")).is_some());
    }

    #[test]
    fn occupation_rows_cover_every_node() {
        let rows = sample().occupation_rows();
        assert_eq!(rows.len(), 1 + 2 + 3 + 4);
        assert!(rows.iter().all(|r| r.major_group_code.as_str() == "15-0000"));
        assert_eq!(rows[0].occupation_type, HierarchyLevel::Major);

        let stored: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.code.as_str(), r.occupation_type.as_str()))
            .collect();
        assert_eq!(stored[0], ("15-0000", "Major"));
        assert!(stored.contains(&("15-2000", "Minor")));
        assert!(stored.contains(&("15-2010", "Broad")));
        assert!(stored.contains(&("15-2011", "Detailed")));
        let detailed = stored.iter().filter(|(_, t)| *t == "Detailed").count();
        assert_eq!(detailed, 4);
    }

    #[test]
    fn bad_codes_and_duplicates_are_rejected() {
        let bad = r#"{"15-0000": {"name": "x", "minor_groups": {"1520": {"name": "y"}}}}"#;
        assert!(Taxonomy::from_json_str(bad).is_err());

        let dup = r#"{"15-0000": {"name": "x", "minor_groups": {"15-0000": {"name": "y"}}}}"#;
        assert!(Taxonomy::from_json_str(dup).is_err());
    }
}
