// Data loader for the two Minha Casa Minha Vida base tables.
// Both tables are pipe-delimited CSVs with Portuguese headers; they are
// loaded once at startup and never mutated afterwards.

use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Date format used by `dt_assinatura` (e.g. "05/03/2014").
pub const SIGNING_DATE_FORMAT: &str = "%d/%m/%Y";

// ============================================================================
// RECORD TYPES
// ============================================================================

/// One union-funded development contract.
///
/// `ano_assinatura` is derived once from `dt_assinatura` at load time and
/// reused by every aggregation; an unparsable date yields `None`, and such
/// rows are excluded from year-based filters and aggregations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionRecord {
    #[serde(rename = "dt_assinatura")]
    pub signing_date: String,

    /// Derived, not present in the file.
    #[serde(skip_deserializing)]
    pub signing_year: Option<i32>,

    /// Total contracted value, parsed from a comma-thousands string.
    #[serde(rename = "val_contratado_total", deserialize_with = "de_monetary")]
    pub contracted_value: f64,

    /// Disbursed value, parsed from a comma-thousands string.
    #[serde(rename = "val_desembolsado", deserialize_with = "de_monetary")]
    pub disbursed_value: f64,

    #[serde(rename = "txt_sigla_uf")]
    pub state: String,

    #[serde(rename = "txt_regiao")]
    pub region: String,

    #[serde(rename = "txt_nome_municipio")]
    pub municipality: String,

    #[serde(rename = "qtd_uh")]
    pub units: u32,

    #[serde(rename = "txt_modalidade")]
    pub modality: String,

    #[serde(rename = "txt_nome_construtora_entidade")]
    pub builder: String,
}

/// One financed-unit grouping. No region/modality/builder columns exist in
/// this table, which constrains the filter combinations the UI may offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancedRecord {
    #[serde(rename = "num_ano_financiamento")]
    pub financing_year: i32,

    #[serde(rename = "txt_sigla_uf")]
    pub state: String,

    #[serde(rename = "txt_nome_municipio")]
    pub municipality: String,

    #[serde(rename = "qtd_uh_financiadas")]
    pub units: u32,
}

// ============================================================================
// PARSING HELPERS
// ============================================================================

/// Parse a monetary field formatted with comma as thousands separator
/// ("1,234.00" → 1234.0).
///
/// Malformed values are a hard error: a monetary column that silently became
/// zero would corrupt every downstream sum.
pub fn parse_monetary(raw: &str) -> Result<f64> {
    let cleaned = raw.replace(',', "");
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        bail!("empty monetary value");
    }
    trimmed
        .parse::<f64>()
        .with_context(|| format!("invalid monetary value '{}'", raw))
}

fn de_monetary<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_monetary(&raw).map_err(serde::de::Error::custom)
}

/// Extract the signing year from a `dd/mm/yyyy` date string.
/// Returns `None` when the date does not parse (mirrors a coerced NaT).
pub fn parse_signing_year(date: &str) -> Option<i32> {
    NaiveDate::parse_from_str(date.trim(), SIGNING_DATE_FORMAT)
        .ok()
        .map(|d| d.year())
}

// ============================================================================
// FILE LOADING
// ============================================================================

fn pipe_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b'|')
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

/// Load the union-funded developments table.
pub fn load_union(path: &Path) -> Result<Vec<UnionRecord>> {
    let mut reader = pipe_reader(path)?;
    let mut records = Vec::new();

    for (i, row) in reader.deserialize::<UnionRecord>().enumerate() {
        let mut record = row.with_context(|| {
            format!("{}: bad record at row {}", path.display(), i + 1)
        })?;
        record.signing_year = parse_signing_year(&record.signing_date);
        records.push(record);
    }

    Ok(records)
}

/// Load the financed-units table.
pub fn load_financed(path: &Path) -> Result<Vec<FinancedRecord>> {
    let mut reader = pipe_reader(path)?;
    let mut records = Vec::new();

    for (i, row) in reader.deserialize::<FinancedRecord>().enumerate() {
        let record: FinancedRecord = row.with_context(|| {
            format!("{}: bad record at row {}", path.display(), i + 1)
        })?;
        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================
