// View renderer: turns summary tables into chart specifications and record
// slices into displayable/exportable table views. Nothing here filters or
// aggregates; specs visualize exactly what they are given.

use crate::aggregate::{CategoryCount, Source, YearTotal};
use crate::loader::{FinancedRecord, UnionRecord};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Unit totals on the year/term charts are displayed in tens of thousands.
/// Presentation only; stored aggregates stay raw.
pub const DISPLAY_DIVISOR: f64 = 10_000.0;

// ============================================================================
// CHART SPECIFICATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub count: u64,
    /// Percentage of the nonzero total, one decimal place worth of precision.
    pub pct: f64,
}

/// Backend-independent description of one chart.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartSpec {
    Pie {
        title: String,
        slices: Vec<PieSlice>,
    },
    Bar {
        title: String,
        bars: Vec<(String, f64)>,
    },
    Line {
        title: String,
        points: Vec<(i32, f64)>,
    },
}

impl ChartSpec {
    /// An empty spec means the upstream filters matched nothing; the UI
    /// shows a notice instead of a chart.
    pub fn is_empty(&self) -> bool {
        match self {
            ChartSpec::Pie { slices, .. } => slices.is_empty(),
            ChartSpec::Bar { bars, .. } => bars.is_empty(),
            ChartSpec::Line { points, .. } => points.is_empty(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            ChartSpec::Pie { title, .. }
            | ChartSpec::Bar { title, .. }
            | ChartSpec::Line { title, .. } => title,
        }
    }
}

/// Pie over category counts. Zero-count categories never get a slice, so
/// the percentage labels always sum to 100 over what is shown.
pub fn pie_chart(title: impl Into<String>, counts: &[CategoryCount]) -> ChartSpec {
    let total: u64 = counts.iter().map(|c| c.count).sum();
    let slices = if total == 0 {
        Vec::new()
    } else {
        counts
            .iter()
            .filter(|c| c.count > 0)
            .map(|c| PieSlice {
                label: c.label.clone(),
                count: c.count,
                pct: (c.count as f64 / total as f64) * 100.0,
            })
            .collect()
    };

    ChartSpec::Pie {
        title: title.into(),
        slices,
    }
}

/// Vertical bar chart in the exact order of the input summary.
pub fn bar_chart(title: impl Into<String>, rows: &[CategoryCount]) -> ChartSpec {
    ChartSpec::Bar {
        title: title.into(),
        bars: rows
            .iter()
            .map(|r| (r.label.clone(), r.count as f64))
            .collect(),
    }
}

/// Bar chart with the tens-of-thousands display scaling (term totals).
pub fn bar_chart_scaled(title: impl Into<String>, rows: &[CategoryCount]) -> ChartSpec {
    ChartSpec::Bar {
        title: title.into(),
        bars: rows
            .iter()
            .map(|r| (r.label.clone(), r.count as f64 / DISPLAY_DIVISOR))
            .collect(),
    }
}

/// Year line chart, scaled. Points are re-sorted ascending by year here:
/// this chart owns its order independent of upstream sorting.
pub fn line_chart(title: impl Into<String>, rows: &[YearTotal]) -> ChartSpec {
    let mut points: Vec<(i32, f64)> = rows
        .iter()
        .map(|r| (r.year, r.units as f64 / DISPLAY_DIVISOR))
        .collect();
    points.sort_by_key(|(year, _)| *year);

    ChartSpec::Line {
        title: title.into(),
        points,
    }
}

// ============================================================================
// TABLE VIEW
// ============================================================================

/// A displayable projection of one base table: column names plus stringified
/// rows. Supports column removal, row limiting, and CSV export.
#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn from_union(records: &[UnionRecord]) -> Self {
        let columns = vec![
            "dt_assinatura".to_string(),
            "ano_assinatura".to_string(),
            "val_contratado_total".to_string(),
            "val_desembolsado".to_string(),
            "txt_sigla_uf".to_string(),
            "txt_regiao".to_string(),
            "txt_nome_municipio".to_string(),
            "qtd_uh".to_string(),
            "txt_modalidade".to_string(),
            "txt_nome_construtora_entidade".to_string(),
        ];
        let rows = records
            .iter()
            .map(|r| {
                vec![
                    r.signing_date.clone(),
                    r.signing_year.map(|y| y.to_string()).unwrap_or_default(),
                    format!("{:.2}", r.contracted_value),
                    format!("{:.2}", r.disbursed_value),
                    r.state.clone(),
                    r.region.clone(),
                    r.municipality.clone(),
                    r.units.to_string(),
                    r.modality.clone(),
                    r.builder.clone(),
                ]
            })
            .collect();
        TableView { columns, rows }
    }

    pub fn from_financed(records: &[FinancedRecord]) -> Self {
        let columns = vec![
            "num_ano_financiamento".to_string(),
            "txt_sigla_uf".to_string(),
            "txt_nome_municipio".to_string(),
            "qtd_uh_financiadas".to_string(),
        ];
        let rows = records
            .iter()
            .map(|r| {
                vec![
                    r.financing_year.to_string(),
                    r.state.clone(),
                    r.municipality.clone(),
                    r.units.to_string(),
                ]
            })
            .collect();
        TableView { columns, rows }
    }

    /// Projection: a new view without the named columns. Unknown names are
    /// ignored.
    pub fn drop_columns(&self, names: &[String]) -> TableView {
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !names.contains(c))
            .map(|(i, _)| i)
            .collect();

        TableView {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> TableView {
        TableView {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Comma-separated rendering with a header row (the download format).
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(&self.columns)
            .context("failed to write CSV header")?;
        for row in &self.rows {
            writer.write_record(row).context("failed to write CSV row")?;
        }
        let bytes = writer.into_inner().context("failed to flush CSV writer")?;
        String::from_utf8(bytes).context("CSV output was not valid UTF-8")
    }

    /// Write the filtered view to `{source}_filtrada.csv` under `dir`.
    pub fn write_csv(&self, dir: &Path, source: Source) -> Result<PathBuf> {
        let path = dir.join(export_filename(source));
        std::fs::write(&path, self.to_csv()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

/// Download filename for a filtered table.
pub fn export_filename(source: Source) -> String {
    format!("{}_filtrada.csv", source.code())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> Vec<CategoryCount> {
        pairs
            .iter()
            .map(|(label, count)| CategoryCount {
                label: label.to_string(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn test_pie_excludes_zero_categories() {
        let spec = pie_chart("Modalidades", &counts(&[("FAR", 3), ("Entidades", 0), ("FDS", 1)]));
        match spec {
            ChartSpec::Pie { slices, .. } => {
                assert_eq!(slices.len(), 2);
                assert!(slices.iter().all(|s| s.label != "Entidades"));
                let pct_sum: f64 = slices.iter().map(|s| s.pct).sum();
                assert!((pct_sum - 100.0).abs() < 1e-9);
                assert!((slices[0].pct - 75.0).abs() < 1e-9);
            }
            _ => panic!("expected a pie spec"),
        }
    }

    #[test]
    fn test_pie_all_zero_is_empty() {
        let spec = pie_chart("Modalidades", &counts(&[("FAR", 0), ("FDS", 0)]));
        assert!(spec.is_empty());
    }

    #[test]
    fn test_bar_preserves_input_order() {
        let spec = bar_chart("Top", &counts(&[("B", 70), ("A", 50), ("C", 50)]));
        match spec {
            ChartSpec::Bar { bars, .. } => {
                let labels: Vec<&str> = bars.iter().map(|(l, _)| l.as_str()).collect();
                assert_eq!(labels, vec!["B", "A", "C"]);
            }
            _ => panic!("expected a bar spec"),
        }
    }

    #[test]
    fn test_scaled_bar_divides_for_display_only() {
        let rows = counts(&[("Lula 2", 250_000)]);
        let spec = bar_chart_scaled("Mandatos", &rows);
        match spec {
            ChartSpec::Bar { bars, .. } => assert_eq!(bars[0].1, 25.0),
            _ => panic!("expected a bar spec"),
        }
        // The summary itself is untouched
        assert_eq!(rows[0].count, 250_000);
    }

    #[test]
    fn test_line_sorts_ascending_by_year() {
        let rows = vec![
            YearTotal { year: 2020, units: 20_000 },
            YearTotal { year: 2009, units: 10_000 },
        ];
        let spec = line_chart("Anos", &rows);
        match spec {
            ChartSpec::Line { points, .. } => {
                assert_eq!(points, vec![(2009, 1.0), (2020, 2.0)]);
            }
            _ => panic!("expected a line spec"),
        }
    }

    #[test]
    fn test_table_view_drop_and_head() {
        let records = vec![FinancedRecord {
            financing_year: 2015,
            state: "SP".to_string(),
            municipality: "Campinas".to_string(),
            units: 30,
        }];
        let view = TableView::from_financed(&records);
        assert_eq!(view.columns.len(), 4);

        let projected = view.drop_columns(&["txt_sigla_uf".to_string()]);
        assert_eq!(projected.columns.len(), 3);
        assert_eq!(projected.rows[0], vec!["2015", "Campinas", "30"]);

        assert_eq!(view.head(0).row_count(), 0);
        assert_eq!(view.head(5).row_count(), 1);
    }

    #[test]
    fn test_table_view_csv_has_header_and_commas() {
        let records = vec![FinancedRecord {
            financing_year: 2015,
            state: "SP".to_string(),
            municipality: "Campinas".to_string(),
            units: 30,
        }];
        let csv = TableView::from_financed(&records).to_csv().unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "num_ano_financiamento,txt_sigla_uf,txt_nome_municipio,qtd_uh_financiadas"
        );
        assert_eq!(lines.next().unwrap(), "2015,SP,Campinas,30");
    }

    #[test]
    fn test_export_filename_per_source() {
        assert_eq!(export_filename(Source::Union), "uniao_filtrada.csv");
        assert_eq!(export_filename(Source::Financed), "financiado_filtrada.csv");
    }
}
