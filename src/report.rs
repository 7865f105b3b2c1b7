//! Rendering of result tables.
//!
//! Every analysis produces a flat table. [`Tabular`] exposes it as headers
//! plus typed cells so one renderer covers aligned text, CSV, JSON and JSON
//! Lines. Nulls print as `null` in text and JSON and as an empty CSV field.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::drift::DriftReport;
use crate::error::{DriftError, IntoDriftError, Result};
use crate::feature::FeatureStabilityReport;
use crate::stability::StabilityReport;

/// Output format for result tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Aligned plain-text table.
    #[default]
    Table,
    /// CSV with headers.
    Csv,
    /// JSON array of row objects.
    Json,
    /// JSON Lines (one row object per line).
    Jsonl,
}

impl ExportFormat {
    /// File extension for this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Table => "txt",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(ExportFormat::Table),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "jsonl" | "ndjson" => Ok(ExportFormat::Jsonl),
            _ => Err(DriftError::invalid_config(
                "format",
                format!("invalid output format '{s}'. Valid formats: table, csv, json, jsonl"),
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Table => write!(f, "table"),
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Jsonl => write!(f, "jsonl"),
        }
    }
}

/// A single table cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Text value.
    Text(String),
    /// Floating-point value.
    Float(f64),
    /// Integer value (scores and flags).
    Int(i64),
    /// Missing value.
    Null,
}

impl Cell {
    fn float(value: Option<f64>) -> Self {
        value.map_or(Cell::Null, Cell::Float)
    }

    fn score(value: Option<u8>) -> Self {
        value.map_or(Cell::Null, |v| Cell::Int(i64::from(v)))
    }

    fn text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Float(v) => v.to_string(),
            Cell::Int(v) => v.to_string(),
            Cell::Null => "null".to_string(),
        }
    }

    fn csv_field(&self) -> String {
        match self {
            Cell::Null => String::new(),
            other => other.text(),
        }
    }

    fn json(&self) -> Value {
        match self {
            Cell::Text(s) => Value::String(s.clone()),
            Cell::Float(v) => serde_json::Number::from_f64(*v).map_or(Value::Null, Value::Number),
            Cell::Int(v) => Value::from(*v),
            Cell::Null => Value::Null,
        }
    }
}

/// A result that can be rendered as a table.
pub trait Tabular {
    /// Column names in output order.
    fn headers(&self) -> Vec<String>;

    /// Rows of cells, each as long as [`Tabular::headers`].
    fn rows(&self) -> Vec<Vec<Cell>>;
}

impl Tabular for DriftReport {
    fn headers(&self) -> Vec<String> {
        let mut headers = vec!["attribute".to_string()];
        headers.extend(self.metrics.iter().map(|m| m.column_name().to_string()));
        headers.push("flagged".to_string());
        headers
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.rows
            .iter()
            .map(|row| {
                let mut cells = vec![Cell::Text(row.attribute.clone())];
                cells.extend(self.metrics.iter().map(|&m| Cell::float(row.score(m))));
                cells.push(Cell::Int(i64::from(row.flagged)));
                cells
            })
            .collect()
    }
}

impl Tabular for StabilityReport {
    fn headers(&self) -> Vec<String> {
        [
            "attribute",
            "mean_cv",
            "stddev_cv",
            "kurtosis_cv",
            "mean_si",
            "stddev_si",
            "kurtosis_si",
            "stability_index",
            "flagged",
        ]
        .map(String::from)
        .to_vec()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    Cell::Text(r.attribute.clone()),
                    Cell::float(r.mean_cv),
                    Cell::float(r.stddev_cv),
                    Cell::float(r.kurtosis_cv),
                    Cell::score(r.mean_si),
                    Cell::score(r.stddev_si),
                    Cell::score(r.kurtosis_si),
                    Cell::float(r.stability_index),
                    Cell::Int(i64::from(r.flagged)),
                ]
            })
            .collect()
    }
}

impl Tabular for FeatureStabilityReport {
    fn headers(&self) -> Vec<String> {
        [
            "feature_formula",
            "mean_cv",
            "stddev_cv",
            "mean_si",
            "stddev_si",
            "stability_index_lower_bound",
            "stability_index_upper_bound",
            "flagged_lower",
            "flagged_upper",
        ]
        .map(String::from)
        .to_vec()
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    Cell::Text(r.feature_formula.clone()),
                    Cell::float(r.mean_cv),
                    Cell::float(r.stddev_cv),
                    Cell::score(r.mean_si),
                    Cell::score(r.stddev_si),
                    Cell::float(r.stability_index_lower_bound),
                    Cell::float(r.stability_index_upper_bound),
                    Cell::Int(i64::from(r.flagged_lower)),
                    Cell::Int(i64::from(r.flagged_upper)),
                ]
            })
            .collect()
    }
}

/// Render a table in the requested format.
///
/// # Errors
///
/// Returns an error if CSV or JSON serialization fails.
pub fn render<T: Tabular + ?Sized>(table: &T, format: ExportFormat) -> Result<String> {
    let headers = table.headers();
    let rows = table.rows();
    match format {
        ExportFormat::Table => Ok(render_text(&headers, &rows)),
        ExportFormat::Csv => render_csv(&headers, &rows),
        ExportFormat::Json => Ok(serde_json::to_string_pretty(&json_rows(&headers, &rows))?),
        ExportFormat::Jsonl => {
            let lines: std::result::Result<Vec<String>, _> = json_rows(&headers, &rows)
                .iter()
                .map(serde_json::to_string)
                .collect();
            Ok(lines?.join("\n"))
        }
    }
}

fn render_text(headers: &[String], rows: &[Vec<Cell>]) -> String {
    let texts: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(Cell::text).collect())
        .collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            texts
                .iter()
                .filter_map(|r| r.get(i))
                .map(|t| t.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let write_line = |out: &mut String, cells: &[String]| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        let _ = writeln!(out, "{}", line.join("  ").trim_end());
    };

    write_line(&mut out, headers);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_line(&mut out, &rule);
    for row in &texts {
        write_line(&mut out, row);
    }
    out
}

fn render_csv(headers: &[String], rows: &[Vec<Cell>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row.iter().map(Cell::csv_field))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| DriftError::Io(e.into_error()))?;
    String::from_utf8(bytes).into_drift_data()
}

fn json_rows(headers: &[String], rows: &[Vec<Cell>]) -> Vec<Value> {
    rows.iter()
        .map(|row| {
            let object: Map<String, Value> = headers
                .iter()
                .cloned()
                .zip(row.iter().map(Cell::json))
                .collect();
            Value::Object(object)
        })
        .collect()
}

/// Log which attributes drifted.
pub fn log_drift_impact(report: &DriftReport) {
    let drifted: Vec<&str> = report.flagged().map(|r| r.attribute.as_str()).collect();
    if drifted.is_empty() {
        info!(threshold = report.threshold, "No drifted attributes");
    } else {
        warn!(
            count = drifted.len(),
            threshold = report.threshold,
            "Drifted attributes: {}",
            drifted.join(", ")
        );
    }
}

/// Log which attributes are unstable, with their category.
pub fn log_stability_impact(report: &StabilityReport) {
    let unstable: Vec<&str> = report
        .rows
        .iter()
        .filter(|r| r.is_flagged())
        .map(|r| r.attribute.as_str())
        .collect();
    if unstable.is_empty() {
        info!(threshold = report.threshold, "No unstable attributes");
    } else {
        warn!(
            count = unstable.len(),
            threshold = report.threshold,
            "Unstable attributes: {}",
            unstable.join(", ")
        );
    }
    for row in &report.rows {
        match row.category() {
            Some(category) => info!(attribute = %row.attribute, index = row.stability_index, %category, "Stability"),
            None => info!(attribute = %row.attribute, "Stability undefined (null statistic)"),
        }
    }
}

/// Log which derived features are flagged on either bound.
pub fn log_feature_impact(report: &FeatureStabilityReport) {
    for row in &report.rows {
        if row.flagged_upper == 1 {
            warn!(feature = %row.feature_formula, "Derived feature unstable even in the best case");
        } else if row.flagged_lower == 1 {
            warn!(feature = %row.feature_formula, "Derived feature possibly unstable");
        } else {
            info!(
                feature = %row.feature_formula,
                lower = row.stability_index_lower_bound,
                upper = row.stability_index_upper_bound,
                "Derived feature stable"
            );
        }
    }
}
