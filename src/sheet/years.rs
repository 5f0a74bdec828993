// src/sheet/years.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

static YEAR_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b((?:19|20)\d{2})\s*[-\u{2010}-\u{2015}]\s*(\d{4}|\d{2})\b").expect("static regex")
});

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("static regex"));

/// Year information embedded in one header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum YearSpan {
    Single(i32),
    Range { start: i32, end: i32 },
}

impl YearSpan {
    pub fn first(&self) -> i32 {
        match self {
            YearSpan::Single(y) => *y,
            YearSpan::Range { start, .. } => *start,
        }
    }

    pub fn last(&self) -> i32 {
        match self {
            YearSpan::Single(y) => *y,
            YearSpan::Range { end, .. } => *end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YearRole {
    Base,
    Projection,
    Unclassified,
}

/// One year-bearing header with its role inside its group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearTag {
    /// Position of the header in the list given to `classify_years`.
    pub position: usize,
    pub header: String,
    pub span: YearSpan,
    pub role: YearRole,
}

/// Classification result plus any data-quality warnings raised on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct YearClassification {
    pub tags: Vec<YearTag>,
    pub warnings: Vec<String>,
}

impl YearClassification {
    pub fn with_role(&self, role: YearRole) -> Option<&YearTag> {
        self.tags.iter().find(|t| t.role == role)
    }
}

/// Pull the first year, or year range, out of `header`.
///
/// `2023-33` expands to 2023..2033: the two-digit suffix takes the start
/// year's century, rolling over when it would land before the start.
pub fn extract_year_span(header: &str) -> Option<YearSpan> {
    let range = YEAR_RANGE.captures(header);
    let single = YEAR.find(header);

    if let Some(caps) = range {
        let whole = caps.get(0)?;
        // a single year earlier in the string still counts as "first match"
        if single.map_or(true, |s| s.start() >= whole.start()) {
            let start: i32 = caps[1].parse().ok()?;
            let tail = &caps[2];
            let end: i32 = if tail.len() == 4 {
                tail.parse().ok()?
            } else {
                let suffix: i32 = tail.parse().ok()?;
                let mut end = start - start % 100 + suffix;
                if end < start {
                    end += 100;
                }
                end
            };
            return Some(YearSpan::Range { start, end });
        }
    }

    single
        .and_then(|m| m.as_str().parse().ok())
        .map(YearSpan::Single)
}

/// Every year mentioned in `text`, sorted and deduplicated. The end of a
/// two-digit range (`2023-33`) is expanded like in [`extract_year_span`].
pub fn years_in(text: &str) -> Vec<i32> {
    let mut years: Vec<i32> = YEAR
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    for caps in YEAR_RANGE.captures_iter(text) {
        if let Some(span) = caps.get(0).and_then(|m| extract_year_span(m.as_str())) {
            years.push(span.last());
        }
    }
    years.sort_unstable();
    years.dedup();
    years
}

/// Assign base/projection roles across one group of headers.
///
/// With two or more year-bearing headers the smallest year is the base and
/// the largest the projection. Duplicate years keep the first occurrence and
/// raise a warning. A lone header stays unclassified.
pub fn classify_years(headers: &[String]) -> YearClassification {
    let mut out = YearClassification::default();
    for (position, h) in headers.iter().enumerate() {
        if let Some(span) = extract_year_span(h) {
            out.tags.push(YearTag {
                position,
                header: h.clone(),
                span,
                role: YearRole::Unclassified,
            });
        }
    }

    if out.tags.len() < 2 {
        return out;
    }

    let min = out.tags.iter().map(|t| t.span.first()).min();
    let max = out.tags.iter().map(|t| t.span.first()).max();
    let (Some(min), Some(max)) = (min, max) else {
        return out;
    };

    let mut seen = std::collections::BTreeSet::new();
    for tag in out.tags.iter() {
        if !seen.insert(tag.span.first()) {
            let msg = format!("duplicate year {} in `{}`", tag.span.first(), tag.header);
            warn!("{}", msg);
            out.warnings.push(msg);
        }
    }

    if let Some(t) = out.tags.iter_mut().find(|t| t.span.first() == min) {
        t.role = YearRole::Base;
    }
    if max != min {
        if let Some(t) = out.tags.iter_mut().find(|t| t.span.first() == max) {
            t.role = YearRole::Projection;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_years_and_ranges() {
        assert_eq!(extract_year_span("Employment, 2023"), Some(YearSpan::Single(2023)));
        assert_eq!(
            extract_year_span("Employment change, percent, 2023-33"),
            Some(YearSpan::Range { start: 2023, end: 2033 })
        );
        assert_eq!(
            extract_year_span("Occupational openings, 2023\u{2013}33 annual average"),
            Some(YearSpan::Range { start: 2023, end: 2033 })
        );
        assert_eq!(
            extract_year_span("Change, 1998-2008"),
            Some(YearSpan::Range { start: 1998, end: 2008 })
        );
        assert_eq!(
            extract_year_span("Change, 1995-05"),
            Some(YearSpan::Range { start: 1995, end: 2005 })
        );
        assert_eq!(extract_year_span("Median annual wage, 2023(1)"), Some(YearSpan::Single(2023)));
        assert_eq!(extract_year_span("Typical education"), None);
    }

    #[test]
    fn first_match_is_taken() {
        assert_eq!(
            extract_year_span("2023 matrix, change 2024-34"),
            Some(YearSpan::Single(2023))
        );
    }

    #[test]
    fn years_in_titles() {
        assert_eq!(
            years_in("Table 1.2 Employment by detailed occupation, 2023 and projected 2033"),
            vec![2023, 2033]
        );
        assert_eq!(years_in("Occupational openings, 2023\u{2013}33"), vec![2023, 2033]);
        assert_eq!(years_in("Wages as of May 2023, 2023"), vec![2023]);
        assert!(years_in("Table 1.10 (Numbers in thousands) 120000").is_empty());
    }

    #[test]
    fn smallest_is_base_largest_is_projection() {
        let h = vec![
            "Employment, 2033".to_string(),
            "Employment, 2023".to_string(),
        ];
        let c = classify_years(&h);
        assert_eq!(c.with_role(YearRole::Base).unwrap().span, YearSpan::Single(2023));
        assert_eq!(c.with_role(YearRole::Base).unwrap().position, 1);
        assert_eq!(
            c.with_role(YearRole::Projection).unwrap().span,
            YearSpan::Single(2033)
        );
        assert!(c.warnings.is_empty());
    }

    #[test]
    fn lone_header_stays_unclassified() {
        let c = classify_years(&["Employment, 2023".to_string()]);
        assert_eq!(c.tags.len(), 1);
        assert_eq!(c.tags[0].role, YearRole::Unclassified);
    }

    #[test]
    fn ties_warn_and_first_wins() {
        let h = vec![
            "Employment, 2023".to_string(),
            "Employment, 2023 (revised)".to_string(),
            "Employment, 2033".to_string(),
        ];
        let c = classify_years(&h);
        assert_eq!(c.warnings.len(), 1);
        assert_eq!(c.tags[0].role, YearRole::Base);
        assert_eq!(c.tags[1].role, YearRole::Unclassified);
        assert_eq!(c.tags[2].role, YearRole::Projection);
    }
}
