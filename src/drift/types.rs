//! Type definitions for drift detection.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::binning::BinningMethod;
use crate::error::{DriftError, Result};
use crate::metrics::DriftMetric;

/// Default directory used for baseline artefacts when none is configured.
pub const DEFAULT_SOURCE_PATH: &str = "intermediate_data";

/// Default directory name holding the binning model and frequency counts.
pub const DEFAULT_MODEL_DIRECTORY: &str = "drift_statistics";

/// Options for one drift run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftOptions {
    /// Metrics to compute, in output column order.
    pub metrics: Vec<DriftMetric>,
    /// Binning strategy used when training on the source dataset.
    pub bin_method: BinningMethod,
    /// Number of bins.
    pub bin_size: usize,
    /// An attribute is flagged when any metric exceeds this value.
    pub threshold: f64,
    /// Reuse a persisted binning model and frequency counts.
    pub pre_existing_source: bool,
    /// Directory under which baseline artefacts are stored.
    pub source_path: PathBuf,
    /// Subdirectory of `source_path` for this baseline.
    pub model_directory: String,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            metrics: vec![DriftMetric::Psi],
            bin_method: BinningMethod::EqualRange,
            bin_size: 10,
            threshold: 0.1,
            pre_existing_source: false,
            source_path: PathBuf::from(DEFAULT_SOURCE_PATH),
            model_directory: DEFAULT_MODEL_DIRECTORY.to_string(),
        }
    }
}

impl DriftOptions {
    /// Create options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metrics to compute.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Vec<DriftMetric>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the binning method and bin count.
    #[must_use]
    pub fn with_binning(mut self, method: BinningMethod, bin_size: usize) -> Self {
        self.bin_method = method;
        self.bin_size = bin_size;
        self
    }

    /// Set the drift threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Reuse a persisted baseline instead of a source dataset.
    #[must_use]
    pub fn with_pre_existing_source(mut self, pre_existing: bool) -> Self {
        self.pre_existing_source = pre_existing;
        self
    }

    /// Set where baseline artefacts are stored.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = path.into();
        self
    }

    /// Set the baseline subdirectory name.
    #[must_use]
    pub fn with_model_directory(mut self, name: impl Into<String>) -> Self {
        self.model_directory = name.into();
        self
    }

    /// `<source_path>/<model_directory>`.
    #[must_use]
    pub fn model_root(&self) -> PathBuf {
        self.source_path.join(&self.model_directory)
    }

    /// Validate the options before any data is touched.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(DriftError::invalid_config(
                "method_type",
                "at least one drift metric must be selected",
            ));
        }
        if !self.threshold.is_finite() {
            return Err(DriftError::invalid_config(
                "threshold",
                format!("must be finite, got {}", self.threshold),
            ));
        }
        if !self.pre_existing_source && self.bin_size < 2 {
            return Err(DriftError::invalid_config(
                "bin_size",
                format!("must be at least 2, got {}", self.bin_size),
            ));
        }
        if self.model_directory.trim().is_empty() {
            return Err(DriftError::invalid_config(
                "model_directory",
                "must not be empty",
            ));
        }
        Ok(())
    }
}

/// One computed metric value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    /// Metric that produced the value.
    pub metric: DriftMetric,
    /// Value rounded to 4 decimals.
    pub value: f64,
}

/// Drift outcome for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftResult {
    /// Attribute name.
    pub attribute: String,
    /// One score per requested metric, in requested order.
    pub scores: Vec<MetricScore>,
    /// 1 when any score exceeds the threshold, else 0.
    pub flagged: u8,
}

impl DriftResult {
    /// Score of a given metric, if it was requested.
    #[must_use]
    pub fn score(&self, metric: DriftMetric) -> Option<f64> {
        self.scores
            .iter()
            .find(|s| s.metric == metric)
            .map(|s| s.value)
    }

    /// Whether the attribute is flagged as drifted.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.flagged == 1
    }
}

/// Result of a drift run: one row per attribute, flagged rows first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Metrics in column order.
    pub metrics: Vec<DriftMetric>,
    /// Threshold the flags were computed against.
    pub threshold: f64,
    /// Per-attribute rows.
    pub rows: Vec<DriftResult>,
}

impl DriftReport {
    /// Rows flagged as drifted.
    pub fn flagged(&self) -> impl Iterator<Item = &DriftResult> {
        self.rows.iter().filter(|r| r.is_flagged())
    }

    /// Number of drifted attributes.
    #[must_use]
    pub fn drifted_count(&self) -> usize {
        self.flagged().count()
    }

    /// Row for an attribute.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&DriftResult> {
        self.rows.iter().find(|r| r.attribute == attribute)
    }
}

/// True when any score strictly exceeds `threshold`.
///
/// Every score is always computed and reported; this predicate only decides
/// the flag.
#[must_use]
pub fn any_exceeds(scores: &[f64], threshold: f64) -> bool {
    scores.iter().any(|&s| s > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_exceeds_strict() {
        assert!(!any_exceeds(&[0.1, 0.05], 0.1));
        assert!(any_exceeds(&[0.05, 0.1001], 0.1));
        assert!(any_exceeds(&[0.5, 0.0], 0.1));
        assert!(!any_exceeds(&[], 0.1));
    }

    #[test]
    fn test_any_exceeds_independent_of_position() {
        let exceed_last = [0.01, 0.02, 0.03, 0.9];
        let exceed_first = [0.9, 0.01, 0.02, 0.03];
        assert!(any_exceeds(&exceed_last, 0.1));
        assert!(any_exceeds(&exceed_first, 0.1));
    }

    #[test]
    fn test_options_defaults() {
        let options = DriftOptions::default();
        assert_eq!(options.metrics, vec![DriftMetric::Psi]);
        assert_eq!(options.bin_size, 10);
        assert!((options.threshold - 0.1).abs() < f64::EPSILON);
        assert_eq!(
            options.model_root(),
            PathBuf::from("intermediate_data/drift_statistics")
        );
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_validate() {
        assert!(DriftOptions::new().with_metrics(vec![]).validate().is_err());
        assert!(DriftOptions::new()
            .with_binning(BinningMethod::EqualRange, 1)
            .validate()
            .is_err());
        assert!(DriftOptions::new()
            .with_threshold(f64::NAN)
            .validate()
            .unwrap_err()
            .is_config_error());
    }

    #[test]
    fn test_report_helpers() {
        let row = |name: &str, flagged| DriftResult {
            attribute: name.to_string(),
            scores: vec![MetricScore {
                metric: DriftMetric::Psi,
                value: 0.2,
            }],
            flagged,
        };
        let report = DriftReport {
            metrics: vec![DriftMetric::Psi],
            threshold: 0.1,
            rows: vec![row("a", 1), row("b", 0)],
        };
        assert_eq!(report.drifted_count(), 1);
        assert_eq!(report.get("a").unwrap().score(DriftMetric::Psi), Some(0.2));
        assert_eq!(report.get("a").unwrap().score(DriftMetric::Ks), None);
    }
}
