// Minha Casa Minha Vida data explorer - Core Library
// Exposes the data pipeline (load -> filter -> aggregate -> chart) for the
// TUI binary and for tests

pub mod loader;
pub mod filter;
pub mod aggregate;
pub mod chart;

// Interaction controller; only compiled with the TUI feature enabled
#[cfg(feature = "tui")]
pub mod ui;

// Re-export commonly used types
pub use loader::{
    load_financed, load_union, parse_monetary, parse_signing_year,
    FinancedRecord, UnionRecord, SIGNING_DATE_FORMAT,
};
pub use filter::{
    apply, distinct_municipalities, distinct_regions, distinct_states,
    FilterCriteria, RecordFields, MAX_YEAR, MIN_YEAR,
};
pub use aggregate::{
    modality_counts, top_builders, top_municipalities, units_by_term, units_by_year,
    AreaFilter, BuilderScope, CategoryCount, Source, Term, YearTotal,
};
pub use chart::{
    bar_chart, bar_chart_scaled, export_filename, line_chart, pie_chart,
    ChartSpec, PieSlice, TableView, DISPLAY_DIVISOR,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
