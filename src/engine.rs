//! Aggregation engine abstraction.
//!
//! The statistical core only needs three reductions from whatever executes
//! the heavy lifting: a row count, grouped non-null counts per bin key, and
//! the mean / standard deviation / kurtosis of a column. [`LocalEngine`]
//! answers them in-process over a [`Dataset`]; other engines can be plugged
//! in behind [`AggregationEngine`] without touching the core.

use std::collections::BTreeMap;

use crate::binning::{BinKey, MISSING_BIN};
use crate::dataset::Dataset;
use crate::error::{DriftError, Result};

/// Per-column summary statistics as produced by an engine.
///
/// `excess_kurtosis` follows the Fisher convention (normal = 0); it is `None`
/// when the column has zero variance.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColumnMoments {
    /// Arithmetic mean of non-missing values.
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1 denominator).
    pub stddev: Option<f64>,
    /// Population excess kurtosis.
    pub excess_kurtosis: Option<f64>,
}

/// Narrow interface to a grouped-aggregation backend.
///
/// Calls are synchronous and block until the result is materialized. Errors
/// are not retried; they abort the enclosing analysis.
pub trait AggregationEngine {
    /// Total number of rows, including rows with missing values.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    fn row_count(&self, dataset: &Dataset) -> Result<usize>;

    /// Count of non-missing cells per bin key of a binned column.
    ///
    /// When the column has missing cells, the [`MISSING_BIN`] key is present
    /// with a count of zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is absent or not numeric.
    fn grouped_counts(&self, dataset: &Dataset, attribute: &str) -> Result<BTreeMap<BinKey, u64>>;

    /// Mean, standard deviation and excess kurtosis of a column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is absent or not numeric.
    fn moments(&self, dataset: &Dataset, attribute: &str) -> Result<ColumnMoments>;
}

/// Single-threaded, in-memory engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalEngine;

impl LocalEngine {
    /// Create a new local engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl AggregationEngine for LocalEngine {
    fn row_count(&self, dataset: &Dataset) -> Result<usize> {
        Ok(dataset.row_count())
    }

    fn grouped_counts(&self, dataset: &Dataset, attribute: &str) -> Result<BTreeMap<BinKey, u64>> {
        let mut counts = BTreeMap::new();
        for cell in dataset.numeric(attribute)? {
            match cell {
                Some(value) => {
                    if value.fract() != 0.0 {
                        return Err(DriftError::data(format!(
                            "column '{attribute}' is not binned: found value {value}"
                        )));
                    }
                    *counts.entry(*value as BinKey).or_insert(0) += 1;
                }
                None => {
                    counts.entry(MISSING_BIN).or_insert(0);
                }
            }
        }
        Ok(counts)
    }

    fn moments(&self, dataset: &Dataset, attribute: &str) -> Result<ColumnMoments> {
        let values: Vec<f64> = dataset.numeric(attribute)?.iter().flatten().copied().collect();
        Ok(column_moments(&values))
    }
}

/// Compute mean, sample standard deviation and population excess kurtosis.
#[must_use]
pub fn column_moments(values: &[f64]) -> ColumnMoments {
    let n = values.len();
    if n == 0 {
        return ColumnMoments::default();
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;

    let (mut m2, mut m4) = (0.0, 0.0);
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m4 += d2 * d2;
    }

    let stddev = (n > 1).then(|| (m2 / (nf - 1.0)).sqrt());
    let pop_m2 = m2 / nf;
    let excess_kurtosis = (pop_m2 > 0.0).then(|| (m4 / nf) / (pop_m2 * pop_m2) - 3.0);

    ColumnMoments {
        mean: Some(mean),
        stddev,
        excess_kurtosis,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_moments_known_values() {
        let m = column_moments(&[1.0, 2.0, 3.0, 4.0]);
        assert!((m.mean.unwrap() - 2.5).abs() < 1e-12);
        assert!((m.stddev.unwrap() - 1.290_994_448_735_805_6).abs() < 1e-12);
        // population excess kurtosis of 1..4 is -1.36
        assert!((m.excess_kurtosis.unwrap() + 1.36).abs() < 1e-12);
    }

    #[test]
    fn test_column_moments_degenerate() {
        let empty = column_moments(&[]);
        assert_eq!(empty, ColumnMoments::default());

        let single = column_moments(&[5.0]);
        assert_eq!(single.mean, Some(5.0));
        assert_eq!(single.stddev, None);
        assert_eq!(single.excess_kurtosis, None);

        let constant = column_moments(&[2.0, 2.0, 2.0]);
        assert_eq!(constant.stddev, Some(0.0));
        assert_eq!(constant.excess_kurtosis, None);
    }

    #[test]
    fn test_local_engine_skips_missing() {
        let ds = Dataset::new("t").with_numeric("x", vec![Some(1.0), None, Some(3.0)]);
        let engine = LocalEngine::new();
        assert_eq!(engine.row_count(&ds).unwrap(), 3);
        let m = engine.moments(&ds, "x").unwrap();
        assert_eq!(m.mean, Some(2.0));
    }

    #[test]
    fn test_grouped_counts() {
        let ds = Dataset::new("t").with_numeric(
            "x",
            vec![Some(1.0), Some(2.0), Some(2.0), None, Some(3.0)],
        );
        let counts = LocalEngine.grouped_counts(&ds, "x").unwrap();
        assert_eq!(counts.get(&1), Some(&1));
        assert_eq!(counts.get(&2), Some(&2));
        assert_eq!(counts.get(&3), Some(&1));
        assert_eq!(counts.get(&MISSING_BIN), Some(&0));
        assert_eq!(counts.keys().next(), Some(&MISSING_BIN));
    }

    #[test]
    fn test_grouped_counts_rejects_unbinned() {
        let ds = Dataset::new("t").with_values("x", &[1.5]);
        assert!(LocalEngine.grouped_counts(&ds, "x").unwrap_err().is_data_error());
    }
}
