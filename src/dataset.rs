//! In-memory columnar datasets and attribute selection.
//!
//! A [`Dataset`] is the tabular unit every pipeline consumes: a named set of
//! equally long columns, each either numeric (`Option<f64>` cells) or text.
//! Missing cells are `None`. Datasets are loaded from CSV with per-column
//! type inference: a column is numeric when every non-empty cell parses as a
//! float.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DriftError, Result};

/// A single column of a dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric column; `None` marks a missing value.
    Numeric(Vec<Option<f64>>),
    /// Text column; `None` marks a missing value.
    Text(Vec<Option<String>>),
}

impl Column {
    /// Number of cells in this column.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    /// Returns true if the column has no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the column holds numbers.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric(_))
    }
}

/// Named, column-oriented table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    columns: Vec<(String, Column)>,
}

impl Dataset {
    /// Create an empty dataset with the given display name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Add a numeric column.
    #[must_use]
    pub fn with_numeric(mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        self.set_column(name.into(), Column::Numeric(values));
        self
    }

    /// Add a fully populated numeric column.
    #[must_use]
    pub fn with_values(self, name: impl Into<String>, values: &[f64]) -> Self {
        let cells = values.iter().copied().map(Some).collect();
        self.with_numeric(name, cells)
    }

    /// Add a text column.
    #[must_use]
    pub fn with_text(mut self, name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        self.set_column(name.into(), Column::Text(values));
        self
    }

    /// Insert or replace a column, keeping the original column position.
    pub fn set_column(&mut self, name: String, column: Column) {
        if let Some(slot) = self.columns.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = column;
        } else {
            self.columns.push((name, column));
        }
    }

    /// Load a dataset from a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or rows have inconsistent
    /// widths.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (i, field) in record.iter().enumerate() {
                raw[i].push(field.to_string());
            }
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mut dataset = Self::new(name);
        for (header, cells) in headers.into_iter().zip(raw) {
            dataset.set_column(header, infer_column(cells));
        }

        debug!(
            dataset = %dataset.name,
            rows = dataset.row_count(),
            columns = dataset.columns.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Display name of the dataset.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows (length of the first column, 0 when there are none).
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |(_, c)| c.len())
    }

    /// All column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Names of numeric columns in declaration order.
    #[must_use]
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|(_, c)| c.is_numeric())
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Look up a column by name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    /// Numeric cells of a column.
    ///
    /// # Errors
    ///
    /// Returns an invalid-attribute error when the column is missing or not
    /// numeric.
    pub fn numeric(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.column(name) {
            Some(Column::Numeric(values)) => Ok(values),
            Some(Column::Text(_)) => Err(DriftError::invalid_attribute(
                name,
                format!("column is not numeric in dataset '{}'", self.name),
            )),
            None => Err(DriftError::invalid_attribute(
                name,
                format!("column not present in dataset '{}'", self.name),
            )),
        }
    }
}

fn infer_column(cells: Vec<String>) -> Column {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| {
            if is_missing(cell) {
                Some(None)
            } else {
                // NaN and infinities are treated as missing
                cell.parse::<f64>().ok().map(|v| v.is_finite().then_some(v))
            }
        })
        .collect();

    match parsed {
        Some(values) if values.iter().any(Option::is_some) || cells.is_empty() => {
            Column::Numeric(values)
        }
        _ => Column::Text(
            cells
                .into_iter()
                .map(|c| if is_missing(&c) { None } else { Some(c) })
                .collect(),
        ),
    }
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell.eq_ignore_ascii_case("null") || cell.eq_ignore_ascii_case("na")
}

/// Which attributes of a dataset an analysis should cover.
///
/// Mirrors the usual column-list conventions: `"all"` selects every numeric
/// column, otherwise a pipe-delimited list (`"col1|col2"`) or explicit list is
/// used, and anything in `drop` is removed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSelection {
    /// Explicit attributes; empty means all numeric columns.
    pub include: Vec<String>,
    /// Attributes removed after inclusion.
    pub drop: Vec<String>,
}

impl Default for AttributeSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl AttributeSelection {
    /// Select every numeric column.
    #[must_use]
    pub fn all() -> Self {
        Self {
            include: Vec::new(),
            drop: Vec::new(),
        }
    }

    /// Select the given attributes.
    #[must_use]
    pub fn of<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: attributes.into_iter().map(Into::into).collect(),
            drop: Vec::new(),
        }
    }

    /// Parse the `"all"` / pipe-delimited form.
    #[must_use]
    pub fn parse(list_of_cols: &str, drop_cols: &str) -> Self {
        let include = if list_of_cols.trim().eq_ignore_ascii_case("all") {
            Vec::new()
        } else {
            split_pipe(list_of_cols)
        };
        Self {
            include,
            drop: split_pipe(drop_cols),
        }
    }

    /// Remove additional attributes.
    #[must_use]
    pub fn with_drop<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop.extend(attributes.into_iter().map(Into::into));
        self
    }

    /// Resolve the selection against a dataset.
    ///
    /// The result keeps request order, is de-duplicated, and contains only
    /// numeric columns.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::InvalidAttribute`] if an explicitly requested
    /// attribute is missing or not numeric, or if nothing remains after
    /// dropping.
    pub fn resolve(&self, dataset: &Dataset) -> Result<Vec<String>> {
        let numeric: Vec<&str> = dataset.numeric_columns();
        let candidates: Vec<String> = if self.include.is_empty() {
            numeric.iter().map(|s| s.to_string()).collect()
        } else {
            self.include.clone()
        };

        let dropped: HashSet<&str> = self.drop.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();
        for attribute in candidates {
            if dropped.contains(attribute.as_str()) || !seen.insert(attribute.clone()) {
                continue;
            }
            if !numeric.contains(&attribute.as_str()) {
                let reason = if dataset.column(&attribute).is_some() {
                    "column is not numeric"
                } else {
                    "column not present in dataset"
                };
                return Err(DriftError::invalid_attribute(attribute, reason));
            }
            resolved.push(attribute);
        }

        if resolved.is_empty() {
            return Err(DriftError::invalid_attribute(
                "<none>",
                "no numeric attributes left to analyse",
            ));
        }
        Ok(resolved)
    }
}

fn split_pipe(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
