//! Stability estimation for derived features.
//!
//! A derived feature `g(x1, .., xn)` is never materialized. Its mean and
//! variance per ledger period are approximated from the attributes' moments
//! with a second-order Taylor expansion around the attribute means:
//!
//! ```text
//! E[g]   ~ g(mu) + sum_i (sigma_i^2 / 2) * d2g/dxi2
//! Var[g] ~ sum_i sigma_i^2 * (dg/dxi)^2
//! ```
//!
//! Attributes are treated as independent; covariance terms are omitted.
//! The estimated series are then scored like attribute series, except that
//! no kurtosis is available, so the index is reported as a range whose upper
//! bound assumes a perfect kurtosis sub-score.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DriftError, Result};
use crate::expr::{Bindings, Expr, Formula};
use crate::metrics::round4;
use crate::stability::{
    coefficient_of_variation, flag_unstable, score_cv_with, weighted_index, CvThresholds,
    MetricWeights, MomentLedger, DEFAULT_STABILITY_THRESHOLD,
};

/// A derived feature: an ordered attribute set and a formula over it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTransformation {
    attributes: Vec<String>,
    formula: Formula,
}

impl FeatureTransformation {
    /// Create a transformation.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the attribute set is empty, the
    /// formula does not parse, or it uses a variable outside the set.
    pub fn new<I, S>(attributes: I, formula: &str) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for name in attributes {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Err(DriftError::formula(formula, "attribute set is empty"));
        }

        let formula = Formula::parse(formula)?;
        if let Some(unknown) = formula.variables().iter().find(|v| !names.contains(*v)) {
            return Err(DriftError::formula(
                formula.source(),
                format!(
                    "variable '{unknown}' is not in the attribute set {}",
                    names.join("|")
                ),
            ));
        }
        Ok(Self {
            attributes: names,
            formula,
        })
    }

    /// Parse the `"X|Y|Z" = "formula"` mapping form.
    ///
    /// # Errors
    ///
    /// See [`FeatureTransformation::new`].
    pub fn from_mapping(key: &str, formula: &str) -> Result<Self> {
        Self::new(key.split('|'), formula)
    }

    /// Attributes in declaration order.
    #[must_use]
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Parsed formula.
    #[must_use]
    pub fn formula(&self) -> &Formula {
        &self.formula
    }
}

/// Estimated moments of a derived feature for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMomentEstimate {
    /// Ledger period index.
    pub idx: u32,
    /// Formula source text.
    pub formula: String,
    /// Estimated mean, null when an input moment is null or the estimate is
    /// not finite.
    pub estimated_mean: Option<f64>,
    /// Estimated standard deviation, null under the same conditions.
    pub estimated_stddev: Option<f64>,
}

struct Partials {
    attribute: String,
    first: Expr,
    second: Expr,
}

/// Estimate the feature's mean and standard deviation for every ledger period.
///
/// # Errors
///
/// Returns [`DriftError::MissingPeriod`] when an attribute has no ledger row
/// for one of the ledger's periods, or a data error for an empty ledger.
pub fn estimate_moments(
    ledger: &MomentLedger,
    transformation: &FeatureTransformation,
) -> Result<Vec<FeatureMomentEstimate>> {
    let periods = ledger.periods();
    if periods.is_empty() {
        return Err(DriftError::data("moment ledger has no periods"));
    }
    for &period in &periods {
        for attribute in transformation.attributes() {
            if ledger.record(period, attribute).is_none() {
                return Err(DriftError::MissingPeriod {
                    attribute: attribute.clone(),
                    period,
                });
            }
        }
    }

    let formula = transformation.formula();
    let partials: Vec<Partials> = transformation
        .attributes()
        .iter()
        .map(|attribute| {
            let first = formula.derivative(attribute);
            let second = first.derivative(attribute);
            Partials {
                attribute: attribute.clone(),
                first,
                second,
            }
        })
        .collect();

    let mut estimates = Vec::with_capacity(periods.len());
    for period in periods {
        let (estimated_mean, estimated_stddev) = match period_inputs(ledger, period, &partials) {
            Some((means, variances)) => estimate_period(formula, &partials, &means, &variances)?,
            None => (None, None),
        };
        debug!(
            formula = formula.source(),
            period,
            ?estimated_mean,
            ?estimated_stddev,
            "Estimated feature moments"
        );
        estimates.push(FeatureMomentEstimate {
            idx: period,
            formula: formula.source().to_string(),
            estimated_mean,
            estimated_stddev,
        });
    }
    Ok(estimates)
}

/// Means and variances of every attribute, or `None` if any is null.
fn period_inputs(
    ledger: &MomentLedger,
    period: u32,
    partials: &[Partials],
) -> Option<(Bindings, Vec<f64>)> {
    let mut means = Bindings::new();
    let mut variances = Vec::with_capacity(partials.len());
    for p in partials {
        let record = ledger.record(period, &p.attribute)?;
        means.insert(p.attribute.clone(), record.mean?);
        let stddev = record.stddev?;
        variances.push(stddev * stddev);
    }
    Some((means, variances))
}

fn estimate_period(
    formula: &Formula,
    partials: &[Partials],
    means: &Bindings,
    variances: &[f64],
) -> Result<(Option<f64>, Option<f64>)> {
    let mut mean = formula.eval(means)?;
    let mut variance = 0.0;
    for (p, sigma2) in partials.iter().zip(variances) {
        let first = p.first.eval(means)?;
        let second = p.second.eval(means)?;
        mean += sigma2 / 2.0 * second;
        variance += sigma2 * first * first;
    }
    let finite = |v: f64| v.is_finite().then_some(v);
    Ok((finite(mean), finite(variance.sqrt())))
}

/// Stability range of one derived feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStabilityResult {
    /// Formula source text.
    pub feature_formula: String,
    /// Coefficient of variation of the estimated means.
    pub mean_cv: Option<f64>,
    /// Coefficient of variation of the estimated standard deviations.
    pub stddev_cv: Option<f64>,
    /// Sub-score of the mean series.
    pub mean_si: Option<u8>,
    /// Sub-score of the stddev series.
    pub stddev_si: Option<u8>,
    /// Index assuming the worst kurtosis sub-score.
    pub stability_index_lower_bound: Option<f64>,
    /// Index assuming the best kurtosis sub-score.
    pub stability_index_upper_bound: Option<f64>,
    /// Flag computed on the lower bound.
    pub flagged_lower: u8,
    /// Flag computed on the upper bound.
    pub flagged_upper: u8,
}

/// Result of a feature stability run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStabilityReport {
    /// Threshold the flags were computed against.
    pub threshold: f64,
    /// Weights used for the bounds.
    pub weights: MetricWeights,
    /// One row per transformation, in input order.
    pub rows: Vec<FeatureStabilityResult>,
}

impl FeatureStabilityReport {
    /// Rows whose lower bound is flagged.
    #[must_use]
    pub fn flagged_lower_count(&self) -> usize {
        self.rows.iter().filter(|r| r.flagged_lower == 1).count()
    }
}

/// Scores derived features from a moment ledger.
#[derive(Debug, Clone)]
pub struct FeatureStabilityEstimator {
    weights: MetricWeights,
    threshold: f64,
    cv_thresholds: CvThresholds,
}

impl Default for FeatureStabilityEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureStabilityEstimator {
    /// Create an estimator with default weights and threshold.
    #[must_use]
    pub fn new() -> Self {
        Self {
            weights: MetricWeights::default(),
            threshold: DEFAULT_STABILITY_THRESHOLD,
            cv_thresholds: CvThresholds::default(),
        }
    }

    /// Set the metric weights.
    #[must_use]
    pub fn with_weights(mut self, weights: MetricWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the flag threshold.
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set custom CV cutoffs.
    #[must_use]
    pub fn with_cv_thresholds(mut self, thresholds: CvThresholds) -> Self {
        self.cv_thresholds = thresholds;
        self
    }

    /// Score every transformation against the ledger.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid weights or threshold, and a
    /// data error when an attribute lacks ledger rows for some period.
    pub fn estimate(
        &self,
        ledger: &MomentLedger,
        transformations: &[FeatureTransformation],
    ) -> Result<FeatureStabilityReport> {
        self.weights.validate()?;
        if !self.threshold.is_finite() {
            return Err(DriftError::invalid_config(
                "threshold",
                format!("must be finite, got {}", self.threshold),
            ));
        }

        let rows = transformations
            .iter()
            .map(|t| Ok(self.score(&estimate_moments(ledger, t)?, t.formula().source())))
            .collect::<Result<Vec<_>>>()?;

        let report = FeatureStabilityReport {
            threshold: self.threshold,
            weights: self.weights,
            rows,
        };
        info!(
            features = report.rows.len(),
            flagged = report.flagged_lower_count(),
            "Feature stability estimated"
        );
        Ok(report)
    }

    /// Score a series of per-period estimates.
    #[must_use]
    pub fn score(&self, estimates: &[FeatureMomentEstimate], formula: &str) -> FeatureStabilityResult {
        let means: Vec<Option<f64>> = estimates.iter().map(|e| e.estimated_mean).collect();
        let stddevs: Vec<Option<f64>> = estimates.iter().map(|e| e.estimated_stddev).collect();
        let mean_cv = coefficient_of_variation(&means);
        let stddev_cv = coefficient_of_variation(&stddevs);
        let mean_si = score_cv_with(mean_cv, &self.cv_thresholds);
        let stddev_si = score_cv_with(stddev_cv, &self.cv_thresholds);

        let lower = weighted_index(&[(mean_si, self.weights.mean), (stddev_si, self.weights.stddev)]);
        let best_kurtosis = f64::from(self.cv_thresholds.max_score()) * self.weights.kurtosis;
        let upper = lower.map(|l| round4(l + best_kurtosis));

        FeatureStabilityResult {
            feature_formula: formula.to_string(),
            mean_cv,
            stddev_cv,
            mean_si,
            stddev_si,
            stability_index_lower_bound: lower,
            stability_index_upper_bound: upper,
            flagged_lower: flag_unstable(lower, self.threshold),
            flagged_upper: flag_unstable(upper, self.threshold),
        }
    }
}
