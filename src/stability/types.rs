//! Core types for attribute stability scoring.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{DriftError, Result};

/// Default stability-index threshold; indices below it are flagged.
pub const DEFAULT_STABILITY_THRESHOLD: f64 = 1.0;

/// Per-period summary statistic tracked in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityMetric {
    /// Period mean.
    Mean,
    /// Period sample standard deviation.
    Stddev,
    /// Period kurtosis (Pearson convention).
    Kurtosis,
}

impl StabilityMetric {
    /// Returns all metrics in output order.
    #[must_use]
    pub fn all() -> [StabilityMetric; 3] {
        [Self::Mean, Self::Stddev, Self::Kurtosis]
    }
}

impl std::fmt::Display for StabilityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mean => write!(f, "mean"),
            Self::Stddev => write!(f, "stddev"),
            Self::Kurtosis => write!(f, "kurtosis"),
        }
    }
}

/// Weight of each metric's sub-score in the stability index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetricWeights {
    /// Weight for the mean sub-score.
    pub mean: f64,
    /// Weight for the standard deviation sub-score.
    pub stddev: f64,
    /// Weight for the kurtosis sub-score.
    pub kurtosis: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            mean: 0.5,
            stddev: 0.3,
            kurtosis: 0.2,
        }
    }
}

impl MetricWeights {
    /// Creates weights with custom values.
    #[must_use]
    pub fn new(mean: f64, stddev: f64, kurtosis: f64) -> Self {
        Self {
            mean,
            stddev,
            kurtosis,
        }
    }

    /// Returns the sum of all weights.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.mean + self.stddev + self.kurtosis
    }

    /// Weight for a metric.
    #[must_use]
    pub fn weight(&self, metric: StabilityMetric) -> f64 {
        match metric {
            StabilityMetric::Mean => self.mean,
            StabilityMetric::Stddev => self.stddev,
            StabilityMetric::Kurtosis => self.kurtosis,
        }
    }

    /// Validates that each weight is finite and non-negative and that the
    /// weights sum to 1 at three decimals.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::InvalidConfig`] for field `weights`.
    pub fn validate(&self) -> Result<()> {
        for metric in StabilityMetric::all() {
            let value = self.weight(metric);
            if value.is_nan() {
                return Err(DriftError::invalid_config(
                    "weights",
                    format!("{metric} weight is NaN"),
                ));
            }
            if value.is_infinite() {
                return Err(DriftError::invalid_config(
                    "weights",
                    format!("{metric} weight is infinite"),
                ));
            }
            if value < 0.0 {
                return Err(DriftError::invalid_config(
                    "weights",
                    format!("{metric} weight is negative: {value}"),
                ));
            }
        }

        let total = (self.total() * 1000.0).round() / 1000.0;
        if total != 1.0 {
            return Err(DriftError::invalid_config(
                "weights",
                format!("weights must sum to 1, got {}", self.total()),
            ));
        }
        Ok(())
    }
}

impl FromStr for MetricWeights {
    type Err = DriftError;

    /// Parses `mean=0.5,stddev=0.3,kurtosis=0.2`. All three keys are required.
    fn from_str(s: &str) -> Result<Self> {
        let (mut mean, mut stddev, mut kurtosis) = (None, None, None);
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(DriftError::invalid_config(
                    "weights",
                    format!("expected key=value, got '{part}'"),
                ));
            };
            let value: f64 = value.trim().parse().map_err(|_| {
                DriftError::invalid_config("weights", format!("'{value}' is not a number"))
            })?;
            let slot = match key.trim().to_lowercase().as_str() {
                "mean" => &mut mean,
                "stddev" => &mut stddev,
                "kurtosis" => &mut kurtosis,
                other => {
                    return Err(DriftError::invalid_config(
                        "weights",
                        format!("unknown metric '{other}'"),
                    ))
                }
            };
            *slot = Some(value);
        }

        match (mean, stddev, kurtosis) {
            (Some(mean), Some(stddev), Some(kurtosis)) => Ok(Self::new(mean, stddev, kurtosis)),
            _ => Err(DriftError::invalid_config(
                "weights",
                "mean, stddev and kurtosis must all be given",
            )),
        }
    }
}

/// Stability result for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityResult {
    /// Attribute name.
    pub attribute: String,
    /// Coefficient of variation of the mean series.
    pub mean_cv: Option<f64>,
    /// Coefficient of variation of the stddev series.
    pub stddev_cv: Option<f64>,
    /// Coefficient of variation of the kurtosis series.
    pub kurtosis_cv: Option<f64>,
    /// Sub-score of the mean series.
    pub mean_si: Option<u8>,
    /// Sub-score of the stddev series.
    pub stddev_si: Option<u8>,
    /// Sub-score of the kurtosis series.
    pub kurtosis_si: Option<u8>,
    /// Weighted stability index, null when any sub-score is null.
    pub stability_index: Option<f64>,
    /// 1 when the index is below the threshold or null.
    pub flagged: u8,
}

impl StabilityResult {
    /// Category of the stability index, if defined.
    #[must_use]
    pub fn category(&self) -> Option<StabilityCategory> {
        self.stability_index.map(StabilityCategory::from_index)
    }

    /// Whether the attribute is flagged as unstable.
    #[must_use]
    pub fn is_flagged(&self) -> bool {
        self.flagged == 1
    }
}

/// Result of a stability run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    /// Threshold the flags were computed against.
    pub threshold: f64,
    /// Weights used for the index.
    pub weights: MetricWeights,
    /// One row per attribute, in resolved attribute order.
    pub rows: Vec<StabilityResult>,
}

impl StabilityReport {
    /// Number of flagged attributes.
    #[must_use]
    pub fn flagged_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_flagged()).count()
    }

    /// Row for an attribute.
    #[must_use]
    pub fn get(&self, attribute: &str) -> Option<&StabilityResult> {
        self.rows.iter().find(|r| r.attribute == attribute)
    }
}

/// Human-readable interpretation of a stability index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityCategory {
    /// Index 0-1.
    VeryUnstable,
    /// Index 1-2.
    Unstable,
    /// Index 2-3.
    MarginallyStable,
    /// Index 3-3.5.
    Stable,
    /// Index 3.5-4.
    VeryStable,
}

impl StabilityCategory {
    /// Creates a category from an index.
    #[must_use]
    pub fn from_index(index: f64) -> Self {
        if index >= 3.5 {
            Self::VeryStable
        } else if index >= 3.0 {
            Self::Stable
        } else if index >= 2.0 {
            Self::MarginallyStable
        } else if index >= 1.0 {
            Self::Unstable
        } else {
            Self::VeryUnstable
        }
    }

    /// Returns all categories from least to most stable.
    #[must_use]
    pub fn all() -> [StabilityCategory; 5] {
        [
            Self::VeryUnstable,
            Self::Unstable,
            Self::MarginallyStable,
            Self::Stable,
            Self::VeryStable,
        ]
    }
}

impl std::fmt::Display for StabilityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VeryUnstable => write!(f, "very unstable"),
            Self::Unstable => write!(f, "unstable"),
            Self::MarginallyStable => write!(f, "marginally stable"),
            Self::Stable => write!(f, "stable"),
            Self::VeryStable => write!(f, "very stable"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_valid() {
        let weights = MetricWeights::default();
        assert!((weights.total() - 1.0).abs() < f64::EPSILON);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn test_weights_validate() {
        assert!(MetricWeights::new(0.5, 0.5, 0.5).validate().is_err());
        assert!(MetricWeights::new(-0.1, 0.9, 0.2).validate().is_err());
        assert!(MetricWeights::new(f64::NAN, 0.5, 0.5).validate().is_err());
        // rounded to three decimals before comparison
        assert!(MetricWeights::new(0.3333, 0.3333, 0.3334).validate().is_ok());
        assert!(MetricWeights::new(1.0, 0.0, 0.0).validate().is_ok());
        assert!(MetricWeights::new(0.5, 0.3, 0.3)
            .validate()
            .unwrap_err()
            .is_config_error());
    }

    #[test]
    fn test_weights_from_str() {
        let weights: MetricWeights = "mean=0.6, stddev=0.2, kurtosis=0.2".parse().unwrap();
        assert_eq!(weights, MetricWeights::new(0.6, 0.2, 0.2));

        assert!("mean=0.6,stddev=0.4".parse::<MetricWeights>().is_err());
        assert!("mean=0.6,skew=0.2,kurtosis=0.2".parse::<MetricWeights>().is_err());
        assert!("mean:0.6".parse::<MetricWeights>().is_err());
    }

    #[test]
    fn test_category_from_index() {
        assert_eq!(StabilityCategory::from_index(0.0), StabilityCategory::VeryUnstable);
        assert_eq!(StabilityCategory::from_index(1.0), StabilityCategory::Unstable);
        assert_eq!(StabilityCategory::from_index(2.9), StabilityCategory::MarginallyStable);
        assert_eq!(StabilityCategory::from_index(3.0), StabilityCategory::Stable);
        assert_eq!(StabilityCategory::from_index(3.5), StabilityCategory::VeryStable);
        assert_eq!(StabilityCategory::from_index(4.0), StabilityCategory::VeryStable);
        assert_eq!(StabilityCategory::Stable.to_string(), "stable");
    }
}
