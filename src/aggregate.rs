// Aggregation pipelines: each entry point filters, groups, and sums one of
// the base tables (or the outer join of both) into a small summary ready for
// charting. Every parameter is passed explicitly; nothing reads UI state.

use crate::filter::{self, FilterCriteria, MAX_YEAR, MIN_YEAR};
use crate::loader::{FinancedRecord, UnionRecord};
use std::collections::HashMap;

// ============================================================================
// SELECTORS
// ============================================================================

/// Which base table(s) an aggregation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Union,
    Financed,
    Both,
}

impl Source {
    /// Display name (matches the dataset's own language).
    pub fn name(&self) -> &str {
        match self {
            Source::Union => "União",
            Source::Financed => "Financiado",
            Source::Both => "Ambas",
        }
    }

    /// Lowercase code used in export filenames.
    pub fn code(&self) -> &str {
        match self {
            Source::Union => "uniao",
            Source::Financed => "financiado",
            Source::Both => "ambas",
        }
    }

    pub fn all() -> [Source; 3] {
        [Source::Union, Source::Financed, Source::Both]
    }

    /// Sources that involve the financed table lack a region column, so the
    /// UI must not offer a region filter for them.
    pub fn has_region(&self) -> bool {
        matches!(self, Source::Union)
    }
}

/// Geographic scope for the top-municipalities chart. Region is only valid
/// for the union table; the controller narrows the choice per source.
#[derive(Debug, Clone, PartialEq)]
pub enum AreaFilter {
    State(String),
    Region(String),
}

impl AreaFilter {
    fn criteria(&self) -> FilterCriteria {
        match self {
            AreaFilter::State(uf) => FilterCriteria::new().with_state(uf.clone()),
            AreaFilter::Region(r) => FilterCriteria::new().with_region(r.clone()),
        }
    }

    pub fn value(&self) -> &str {
        match self {
            AreaFilter::State(v) | AreaFilter::Region(v) => v,
        }
    }
}

/// Dimension whose distinct values are counted per builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderScope {
    Municipalities,
    States,
    Regions,
}

impl BuilderScope {
    pub fn name(&self) -> &str {
        match self {
            BuilderScope::Municipalities => "Municípios",
            BuilderScope::States => "Estados",
            BuilderScope::Regions => "Regiões",
        }
    }

    pub fn all() -> [BuilderScope; 3] {
        [
            BuilderScope::Municipalities,
            BuilderScope::States,
            BuilderScope::Regions,
        ]
    }
}

// ============================================================================
// SUMMARY ROWS
// ============================================================================

/// One (category, measure) row of a summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub label: String,
    pub count: u64,
}

/// One (year, unit total) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearTotal {
    pub year: i32,
    pub units: u64,
}

// ============================================================================
// GROUPING PRIMITIVES
// ============================================================================

/// Sum values per key, keeping keys in first-appearance order so that a
/// later stable sort breaks measure ties by original row order.
fn group_sum<'a>(pairs: impl Iterator<Item = (&'a str, u64)>) -> Vec<CategoryCount> {
    let mut order: Vec<CategoryCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (key, value) in pairs {
        match index.get(key) {
            Some(&i) => order[i].count += value,
            None => {
                index.insert(key.to_string(), order.len());
                order.push(CategoryCount {
                    label: key.to_string(),
                    count: value,
                });
            }
        }
    }

    order
}

/// Descending stable sort by measure, then take the first `n`.
fn top_n(mut rows: Vec<CategoryCount>, n: usize) -> Vec<CategoryCount> {
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows.truncate(n);
    rows
}

/// Full outer join of two summaries on label; a key missing on either side
/// contributes zero, never drops.
fn outer_join_sum(left: Vec<CategoryCount>, right: Vec<CategoryCount>) -> Vec<CategoryCount> {
    let mut joined = left;
    let mut index: HashMap<String, usize> = joined
        .iter()
        .enumerate()
        .map(|(i, row)| (row.label.clone(), i))
        .collect();

    for row in right {
        match index.get(&row.label) {
            Some(&i) => joined[i].count += row.count,
            None => {
                index.insert(row.label.clone(), joined.len());
                joined.push(row);
            }
        }
    }

    joined
}

// ============================================================================
// PRESIDENTIAL TERMS
// ============================================================================

/// The six administration-term buckets, in chronological order. Each covers
/// a contiguous half-open year range; 2016 falls in the Temer bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    Lula2,
    Dilma1,
    Dilma2,
    Temer,
    Bolsonaro,
    Lula3,
}

impl Term {
    pub fn label(&self) -> &str {
        match self {
            Term::Lula2 => "Lula 2",
            Term::Dilma1 => "Dilma 1",
            Term::Dilma2 => "Dilma 2",
            Term::Temer => "Temer",
            Term::Bolsonaro => "Bolsonaro",
            Term::Lula3 => "Lula 3",
        }
    }

    /// Half-open year range `[start, end)` covered by this term bucket.
    pub fn years(&self) -> (i32, i32) {
        match self {
            Term::Lula2 => (2006, 2010),
            Term::Dilma1 => (2010, 2014),
            Term::Dilma2 => (2014, 2016),
            Term::Temer => (2016, 2018),
            Term::Bolsonaro => (2018, 2022),
            Term::Lula3 => (2022, 2024),
        }
    }

    pub fn all() -> [Term; 6] {
        [
            Term::Lula2,
            Term::Dilma1,
            Term::Dilma2,
            Term::Temer,
            Term::Bolsonaro,
            Term::Lula3,
        ]
    }

    /// Bucket a year, or `None` for years outside `[2006, 2024)`.
    pub fn from_year(year: i32) -> Option<Term> {
        Term::all().into_iter().find(|t| {
            let (start, end) = t.years();
            (start..end).contains(&year)
        })
    }
}

// ============================================================================
// AGGREGATION ENTRY POINTS
// ============================================================================

/// Municipalities with the most housing units within a state or region,
/// descending, at most `n` rows. For `Both`, per-source municipality sums
/// are outer-joined before ranking.
pub fn top_municipalities(
    union: &[UnionRecord],
    financed: &[FinancedRecord],
    source: Source,
    area: &AreaFilter,
    n: usize,
) -> Vec<CategoryCount> {
    let criteria = area.criteria();

    let union_sum = || {
        group_sum(
            union
                .iter()
                .filter(|r| criteria.matches(*r))
                .map(|r| (r.municipality.as_str(), u64::from(r.units))),
        )
    };
    let financed_sum = || {
        group_sum(
            financed
                .iter()
                .filter(|r| criteria.matches(*r))
                .map(|r| (r.municipality.as_str(), u64::from(r.units))),
        )
    };

    let grouped = match source {
        Source::Union => union_sum(),
        Source::Financed => financed_sum(),
        Source::Both => outer_join_sum(union_sum(), financed_sum()),
    };

    top_n(grouped, n)
}

/// Builders ranked by how many distinct municipalities/states/regions they
/// operate in, descending, capped at 50 before applying `n`.
pub fn top_builders(union: &[UnionRecord], scope: BuilderScope, n: usize) -> Vec<CategoryCount> {
    let mut order: Vec<(String, Vec<String>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in union {
        let value = match scope {
            BuilderScope::Municipalities => record.municipality.as_str(),
            BuilderScope::States => record.state.as_str(),
            BuilderScope::Regions => record.region.as_str(),
        };
        let i = match index.get(&record.builder) {
            Some(&i) => i,
            None => {
                index.insert(record.builder.clone(), order.len());
                order.push((record.builder.clone(), Vec::new()));
                order.len() - 1
            }
        };
        if !order[i].1.iter().any(|v| v == value) {
            order[i].1.push(value.to_string());
        }
    }

    let counts = order
        .into_iter()
        .map(|(builder, values)| CategoryCount {
            label: builder,
            count: values.len() as u64,
        })
        .collect();

    top_n(counts, n.min(50))
}

/// Units per year for the chosen source, ascending by year, no window.
/// Rows with an unknown signing year are excluded.
pub fn year_totals(
    union: &[UnionRecord],
    financed: &[FinancedRecord],
    source: Source,
) -> Vec<YearTotal> {
    let mut totals: HashMap<i32, u64> = HashMap::new();

    if source != Source::Financed {
        for record in union {
            if let Some(year) = record.signing_year {
                *totals.entry(year).or_insert(0) += u64::from(record.units);
            }
        }
    }
    if source != Source::Union {
        for record in financed {
            *totals.entry(record.financing_year).or_insert(0) += u64::from(record.units);
        }
    }

    let mut rows: Vec<YearTotal> = totals
        .into_iter()
        .map(|(year, units)| YearTotal { year, units })
        .collect();
    rows.sort_by_key(|r| r.year);
    rows
}

/// Yearly unit totals restricted to the 2009-2024 display window.
pub fn units_by_year(
    union: &[UnionRecord],
    financed: &[FinancedRecord],
    source: Source,
) -> Vec<YearTotal> {
    year_totals(union, financed, source)
        .into_iter()
        .filter(|r| (MIN_YEAR..=MAX_YEAR).contains(&r.year))
        .collect()
}

/// Unit totals per presidential term, in chronological term order. All six
/// buckets are present even when empty; years outside `[2006, 2024)` are
/// excluded.
pub fn units_by_term(
    union: &[UnionRecord],
    financed: &[FinancedRecord],
    source: Source,
) -> Vec<CategoryCount> {
    let mut buckets = [0u64; 6];

    for row in year_totals(union, financed, source) {
        for (i, term) in Term::all().into_iter().enumerate() {
            let (start, end) = term.years();
            if (start..end).contains(&row.year) {
                buckets[i] += row.units;
                break;
            }
        }
    }

    Term::all()
        .into_iter()
        .zip(buckets)
        .map(|(term, count)| CategoryCount {
            label: term.label().to_string(),
            count,
        })
        .collect()
}

/// Development count per modality within the union table, optionally
/// filtered, descending by count. An empty result means the filters matched
/// nothing and the caller shows the "no data" notice.
pub fn modality_counts(union: &[UnionRecord], criteria: &FilterCriteria) -> Vec<CategoryCount> {
    let filtered = filter::apply(union, criteria);
    let counts = group_sum(filtered.iter().map(|r| (r.modality.as_str(), 1)));
    top_n(counts, usize::MAX)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn union_row(
        year: Option<i32>,
        state: &str,
        region: &str,
        municipality: &str,
        units: u32,
        modality: &str,
        builder: &str,
    ) -> UnionRecord {
        UnionRecord {
            signing_date: String::new(),
            signing_year: year,
            contracted_value: 0.0,
            disbursed_value: 0.0,
            state: state.to_string(),
            region: region.to_string(),
            municipality: municipality.to_string(),
            units,
            modality: modality.to_string(),
            builder: builder.to_string(),
        }
    }

    fn financed_row(year: i32, state: &str, municipality: &str, units: u32) -> FinancedRecord {
        FinancedRecord {
            financing_year: year,
            state: state.to_string(),
            municipality: municipality.to_string(),
            units,
        }
    }

    #[test]
    fn test_top_n_stable_descending() {
        let rows = vec![
            CategoryCount { label: "A".into(), count: 50 },
            CategoryCount { label: "B".into(), count: 70 },
            CategoryCount { label: "C".into(), count: 50 },
        ];
        let top = top_n(rows, 2);
        assert_eq!(top[0].label, "B");
        assert_eq!(top[0].count, 70);
        // Tie at 50: original order says A before C
        assert_eq!(top[1].label, "A");
    }

    #[test]
    fn test_top_municipalities_union_sums_per_municipality() {
        let union = vec![
            union_row(Some(2014), "SP", "Sudeste", "Campinas", 100, "FAR", "Alfa"),
            union_row(Some(2015), "SP", "Sudeste", "Santos", 40, "FAR", "Beta"),
            union_row(Some(2016), "SP", "Sudeste", "Campinas", 60, "FAR", "Alfa"),
            union_row(Some(2016), "BA", "Nordeste", "Salvador", 500, "FAR", "Gama"),
        ];
        let top = top_municipalities(
            &union,
            &[],
            Source::Union,
            &AreaFilter::State("SP".into()),
            10,
        );
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].label, "Campinas");
        assert_eq!(top[0].count, 160);
        assert_eq!(top[1].label, "Santos");
    }

    #[test]
    fn test_both_source_outer_join_keeps_one_sided_keys() {
        // Union has "X" with 100 units, financed has no "X"; combined total
        // must be 100, not dropped.
        let union = vec![union_row(Some(2014), "SP", "Sudeste", "X", 100, "FAR", "Alfa")];
        let financed = vec![financed_row(2015, "SP", "Y", 30)];

        let top = top_municipalities(
            &union,
            &financed,
            Source::Both,
            &AreaFilter::State("SP".into()),
            10,
        );
        assert_eq!(top.len(), 2);
        assert_eq!(top[0], CategoryCount { label: "X".into(), count: 100 });
        assert_eq!(top[1], CategoryCount { label: "Y".into(), count: 30 });
    }

    #[test]
    fn test_both_source_sums_shared_keys() {
        let union = vec![union_row(Some(2014), "SP", "Sudeste", "X", 100, "FAR", "Alfa")];
        let financed = vec![financed_row(2015, "SP", "X", 30)];

        let top = top_municipalities(
            &union,
            &financed,
            Source::Both,
            &AreaFilter::State("SP".into()),
            10,
        );
        assert_eq!(top, vec![CategoryCount { label: "X".into(), count: 130 }]);
    }

    #[test]
    fn test_top_builders_counts_distinct_values() {
        let union = vec![
            union_row(Some(2014), "SP", "Sudeste", "Campinas", 10, "FAR", "Alfa"),
            union_row(Some(2015), "SP", "Sudeste", "Campinas", 10, "FAR", "Alfa"),
            union_row(Some(2016), "BA", "Nordeste", "Salvador", 10, "FAR", "Alfa"),
            union_row(Some(2016), "SP", "Sudeste", "Santos", 10, "FAR", "Beta"),
        ];

        let by_muni = top_builders(&union, BuilderScope::Municipalities, 10);
        assert_eq!(by_muni[0], CategoryCount { label: "Alfa".into(), count: 2 });
        assert_eq!(by_muni[1], CategoryCount { label: "Beta".into(), count: 1 });

        let by_state = top_builders(&union, BuilderScope::States, 10);
        assert_eq!(by_state[0].count, 2);

        let by_region = top_builders(&union, BuilderScope::Regions, 10);
        assert_eq!(by_region[0].count, 2);
    }

    #[test]
    fn test_term_buckets_partition_2006_2024() {
        for year in 2006..2024 {
            let matching: Vec<Term> = Term::all()
                .into_iter()
                .filter(|t| {
                    let (start, end) = t.years();
                    (start..end).contains(&year)
                })
                .collect();
            assert_eq!(matching.len(), 1, "year {} must have exactly one bucket", year);
            assert_eq!(Term::from_year(year), Some(matching[0]));
        }
        assert_eq!(Term::from_year(2005), None);
        assert_eq!(Term::from_year(2024), None);
        assert_eq!(Term::from_year(2025), None);
    }

    #[test]
    fn test_2016_belongs_to_temer() {
        assert_eq!(Term::from_year(2015), Some(Term::Dilma2));
        assert_eq!(Term::from_year(2016), Some(Term::Temer));
        assert_eq!(Term::from_year(2017), Some(Term::Temer));
    }

    #[test]
    fn test_units_by_term_excludes_out_of_range_years() {
        let union = vec![
            union_row(Some(2005), "SP", "Sudeste", "Campinas", 999, "FAR", "Alfa"),
            union_row(Some(2009), "SP", "Sudeste", "Campinas", 100, "FAR", "Alfa"),
            union_row(Some(2016), "SP", "Sudeste", "Campinas", 50, "FAR", "Alfa"),
        ];
        let terms = units_by_term(&union, &[], Source::Union);

        assert_eq!(terms.len(), 6);
        assert_eq!(terms[0].label, "Lula 2");
        assert_eq!(terms[0].count, 100);
        assert_eq!(terms[3].label, "Temer");
        assert_eq!(terms[3].count, 50);
        // The 2005 row lands nowhere
        let total: u64 = terms.iter().map(|t| t.count).sum();
        assert_eq!(total, 150);
    }

    #[test]
    fn test_units_by_year_window_and_order() {
        let union = vec![
            union_row(Some(2020), "SP", "Sudeste", "Campinas", 10, "FAR", "Alfa"),
            union_row(Some(2008), "SP", "Sudeste", "Campinas", 99, "FAR", "Alfa"),
            union_row(Some(2009), "SP", "Sudeste", "Campinas", 20, "FAR", "Alfa"),
            union_row(None, "SP", "Sudeste", "Campinas", 77, "FAR", "Alfa"),
        ];
        let rows = units_by_year(&union, &[], Source::Union);
        // 2008 and the unknown year are out; result ascends by year
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], YearTotal { year: 2009, units: 20 });
        assert_eq!(rows[1], YearTotal { year: 2020, units: 10 });
    }

    #[test]
    fn test_units_by_year_both_joins_on_year() {
        let union = vec![union_row(Some(2014), "SP", "Sudeste", "Campinas", 100, "FAR", "Alfa")];
        let financed = vec![
            financed_row(2014, "BA", "Salvador", 40),
            financed_row(2015, "BA", "Salvador", 60),
        ];
        let rows = units_by_year(&union, &financed, Source::Both);
        assert_eq!(rows[0], YearTotal { year: 2014, units: 140 });
        assert_eq!(rows[1], YearTotal { year: 2015, units: 60 });
    }

    #[test]
    fn test_modality_counts_descending() {
        let union = vec![
            union_row(Some(2014), "SP", "Sudeste", "Campinas", 10, "Entidades", "Alfa"),
            union_row(Some(2014), "SP", "Sudeste", "Santos", 10, "FAR", "Beta"),
            union_row(Some(2014), "BA", "Nordeste", "Salvador", 10, "FAR", "Gama"),
        ];
        let counts = modality_counts(&union, &FilterCriteria::new());
        assert_eq!(counts[0], CategoryCount { label: "FAR".into(), count: 2 });
        assert_eq!(counts[1], CategoryCount { label: "Entidades".into(), count: 1 });
    }

    #[test]
    fn test_modality_counts_empty_when_filters_match_nothing() {
        let union = vec![union_row(Some(2014), "SP", "Sudeste", "Campinas", 10, "FAR", "Alfa")];
        let counts = modality_counts(&union, &FilterCriteria::new().with_year(2030));
        assert!(counts.is_empty());
    }
}
