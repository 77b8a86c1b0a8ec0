// Filter engine: pure predicates over the base tables.
// Every function returns a new vector; the base tables are never touched.

use crate::loader::{FinancedRecord, UnionRecord};
use std::collections::BTreeSet;

/// Bounds of the year slider exposed by the UI.
pub const MIN_YEAR: i32 = 2009;
pub const MAX_YEAR: i32 = 2024;

// ============================================================================
// RECORD ACCESS
// ============================================================================

/// Common field accessors shared by both base tables, so a single generic
/// filter can serve either one. Fields a table lacks surface as `None`.
pub trait RecordFields {
    fn year(&self) -> Option<i32>;
    fn state(&self) -> &str;
    fn region(&self) -> Option<&str>;
    fn municipality(&self) -> &str;
    fn units(&self) -> u32;
}

impl RecordFields for UnionRecord {
    fn year(&self) -> Option<i32> {
        self.signing_year
    }
    fn state(&self) -> &str {
        &self.state
    }
    fn region(&self) -> Option<&str> {
        Some(&self.region)
    }
    fn municipality(&self) -> &str {
        &self.municipality
    }
    fn units(&self) -> u32 {
        self.units
    }
}

impl RecordFields for FinancedRecord {
    fn year(&self) -> Option<i32> {
        Some(self.financing_year)
    }
    fn state(&self) -> &str {
        &self.state
    }
    fn region(&self) -> Option<&str> {
        None
    }
    fn municipality(&self) -> &str {
        &self.municipality
    }
    fn units(&self) -> u32 {
        self.units
    }
}

// ============================================================================
// CRITERIA
// ============================================================================

/// Optional filter criteria combined with logical AND.
/// Absent criteria are no-ops; a value not present in the column simply
/// produces an empty result, which callers surface as a "no data" notice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    pub year: Option<i32>,
    pub region: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
    /// Restrict to the bounded year window 2009-2024 (inclusive).
    pub bound_years: bool,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_municipality(mut self, municipality: impl Into<String>) -> Self {
        self.municipality = Some(municipality.into());
        self
    }

    pub fn with_bound_years(mut self) -> Self {
        self.bound_years = true;
        self
    }

    /// True when a record satisfies every supplied criterion.
    /// Year criteria exclude rows whose year is unknown (unparsable date).
    pub fn matches<R: RecordFields>(&self, record: &R) -> bool {
        if let Some(year) = self.year {
            match record.year() {
                Some(y) if y == year => {}
                _ => return false,
            }
        }
        if self.bound_years {
            match record.year() {
                Some(y) if (MIN_YEAR..=MAX_YEAR).contains(&y) => {}
                _ => return false,
            }
        }
        if let Some(ref region) = self.region {
            if record.region() != Some(region.as_str()) {
                return false;
            }
        }
        if let Some(ref state) = self.state {
            if record.state() != state {
                return false;
            }
        }
        if let Some(ref municipality) = self.municipality {
            if record.municipality() != municipality {
                return false;
            }
        }
        true
    }
}

/// Filter a table down to the rows matching all supplied criteria.
pub fn apply<R: RecordFields + Clone>(rows: &[R], criteria: &FilterCriteria) -> Vec<R> {
    rows.iter()
        .filter(|r| criteria.matches(*r))
        .cloned()
        .collect()
}

// ============================================================================
// DISTINCT VALUES (selector options for the UI)
// ============================================================================

/// Sorted distinct state codes.
pub fn distinct_states<R: RecordFields>(rows: &[R]) -> Vec<String> {
    distinct(rows, |r| Some(r.state()))
}

/// Sorted distinct region names (empty for the financed table).
pub fn distinct_regions<R: RecordFields>(rows: &[R]) -> Vec<String> {
    distinct(rows, |r| r.region())
}

/// Sorted distinct municipality names.
pub fn distinct_municipalities<R: RecordFields>(rows: &[R]) -> Vec<String> {
    distinct(rows, |r| Some(r.municipality()))
}

fn distinct<R>(rows: &[R], field: fn(&R) -> Option<&str>) -> Vec<String> {
    let set: BTreeSet<&str> = rows
        .iter()
        .filter_map(|r| field(r))
        .filter(|v| !v.is_empty())
        .collect();
    set.into_iter().map(str::to_string).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn union_row(year: Option<i32>, state: &str, region: &str, municipality: &str) -> UnionRecord {
        UnionRecord {
            signing_date: String::new(),
            signing_year: year,
            contracted_value: 0.0,
            disbursed_value: 0.0,
            state: state.to_string(),
            region: region.to_string(),
            municipality: municipality.to_string(),
            units: 10,
            modality: "FAR".to_string(),
            builder: "Alfa".to_string(),
        }
    }

    fn sample() -> Vec<UnionRecord> {
        vec![
            union_row(Some(2014), "SP", "Sudeste", "Campinas"),
            union_row(Some(2020), "BA", "Nordeste", "Salvador"),
            union_row(None, "SP", "Sudeste", "Santos"),
        ]
    }

    #[test]
    fn test_filter_never_grows_and_rows_match() {
        let rows = sample();
        let criteria = FilterCriteria::new().with_state("SP");
        let filtered = apply(&rows, &criteria);

        assert!(filtered.len() <= rows.len());
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|r| criteria.matches(r)));
    }

    #[test]
    fn test_filter_by_year_excludes_unknown_years() {
        let rows = sample();
        let filtered = apply(&rows, &FilterCriteria::new().with_year(2014));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].municipality, "Campinas");
    }

    #[test]
    fn test_filter_absent_value_yields_empty_not_error() {
        let rows = sample();
        let filtered = apply(&rows, &FilterCriteria::new().with_year(2030));
        assert!(filtered.is_empty());

        let filtered = apply(&rows, &FilterCriteria::new().with_state("ZZ"));
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_criteria_are_anded() {
        let rows = sample();
        let criteria = FilterCriteria::new().with_state("SP").with_year(2020);
        assert!(apply(&rows, &criteria).is_empty());

        let criteria = FilterCriteria::new()
            .with_state("SP")
            .with_region("Sudeste")
            .with_year(2014);
        assert_eq!(apply(&rows, &criteria).len(), 1);
    }

    #[test]
    fn test_bound_years_window() {
        let mut rows = sample();
        rows.push(union_row(Some(2005), "RJ", "Sudeste", "Rio de Janeiro"));
        let filtered = apply(&rows, &FilterCriteria::new().with_bound_years());
        // 2014 and 2020 stay; None-year and 2005 drop out
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn test_region_criterion_never_matches_financed() {
        let rows = vec![FinancedRecord {
            financing_year: 2015,
            state: "SP".to_string(),
            municipality: "Campinas".to_string(),
            units: 30,
        }];
        let filtered = apply(&rows, &FilterCriteria::new().with_region("Sudeste"));
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_distinct_values_sorted_and_deduped() {
        let rows = sample();
        assert_eq!(distinct_states(&rows), vec!["BA", "SP"]);
        assert_eq!(distinct_regions(&rows), vec!["Nordeste", "Sudeste"]);
        assert_eq!(
            distinct_municipalities(&rows),
            vec!["Campinas", "Salvador", "Santos"]
        );
    }
}
