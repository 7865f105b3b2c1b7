//! Stability aggregation: period moments into the ledger, ledger series into
//! stability indices.

use tracing::{debug, info};

use super::ledger::{LedgerStore, MomentLedger, PeriodMoments};
use super::score::{coefficient_of_variation, flag_unstable, score_cv_with, weighted_index, CvThresholds};
use super::types::{
    MetricWeights, StabilityMetric, StabilityReport, StabilityResult, DEFAULT_STABILITY_THRESHOLD,
};
use crate::dataset::{AttributeSelection, Dataset};
use crate::engine::AggregationEngine;
use crate::error::{DriftError, Result};

/// Output of one stability run.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityOutcome {
    /// Prior ledger with the new periods appended.
    pub ledger: MomentLedger,
    /// Per-attribute stability scores over the full ledger.
    pub report: StabilityReport,
}

/// Computes attribute stability across chronological snapshots.
pub struct StabilityAggregator<'a, E: AggregationEngine> {
    engine: &'a E,
    weights: MetricWeights,
    threshold: f64,
    cv_thresholds: CvThresholds,
    store: Option<LedgerStore>,
}

impl<'a, E: AggregationEngine> StabilityAggregator<'a, E> {
    /// Create an aggregator with default weights and threshold.
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            weights: MetricWeights::default(),
            threshold: DEFAULT_STABILITY_THRESHOLD,
            cv_thresholds: CvThresholds::default(),
            store: None,
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

    /// Persist the combined ledger to `store` after each run.
    #[must_use]
    pub fn with_ledger_store(mut self, store: LedgerStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Weights in use.
    pub fn weights(&self) -> &MetricWeights {
        &self.weights
    }

    /// Validate weights and threshold.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for invalid weights or a non-finite
    /// threshold.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        if !self.threshold.is_finite() {
            return Err(DriftError::invalid_config(
                "threshold",
                format!("must be finite, got {}", self.threshold),
            ));
        }
        Ok(())
    }

    /// Resolve the attribute list against the first period and check that
    /// every period carries each attribute as a numeric column.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no periods are given or an
    /// attribute is missing or non-numeric in any period.
    pub fn resolve_attributes(
        &self,
        periods: &[Dataset],
        selection: &AttributeSelection,
    ) -> Result<Vec<String>> {
        let Some(first) = periods.first() else {
            return Err(DriftError::config("at least one period dataset is required"));
        };
        let attributes = selection.resolve(first)?;
        for period in &periods[1..] {
            for attribute in &attributes {
                period.numeric(attribute)?;
            }
        }
        Ok(attributes)
    }

    /// Compute, append and score.
    ///
    /// Configuration is validated before the engine is called. The returned
    /// ledger is `prior` followed by one period per dataset in `periods`.
    ///
    /// # Errors
    ///
    /// Returns configuration errors as described on [`Self::validate`] and
    /// [`Self::resolve_attributes`], or any engine / persistence failure.
    pub fn run(
        &self,
        periods: &[Dataset],
        selection: &AttributeSelection,
        prior: &MomentLedger,
    ) -> Result<StabilityOutcome> {
        self.validate()?;
        let attributes = self.resolve_attributes(periods, selection)?;

        let moments = self.compute_moments(periods, &attributes)?;
        let ledger = prior.append_periods(&moments);
        if let Some(store) = &self.store {
            store.save(&ledger)?;
        }

        let report = self.score_ledger(&ledger, &attributes);
        info!(
            attributes = report.rows.len(),
            periods = ledger.periods().len(),
            unstable = report.flagged_count(),
            "Stability index computed"
        );
        Ok(StabilityOutcome { ledger, report })
    }

    /// Moments of each attribute in each period.
    ///
    /// # Errors
    ///
    /// Propagates engine failures.
    pub fn compute_moments(
        &self,
        periods: &[Dataset],
        attributes: &[String],
    ) -> Result<Vec<PeriodMoments>> {
        periods
            .iter()
            .map(|period| {
                attributes
                    .iter()
                    .map(|attribute| {
                        let moments = self.engine.moments(period, attribute)?;
                        debug!(dataset = period.name(), attribute = %attribute, ?moments, "Computed period moments");
                        Ok((attribute.clone(), moments))
                    })
                    .collect::<Result<PeriodMoments>>()
            })
            .collect()
    }

    /// Score every attribute from the ledger series. Pure; no engine calls.
    #[must_use]
    pub fn score_ledger(&self, ledger: &MomentLedger, attributes: &[String]) -> StabilityReport {
        StabilityReport {
            threshold: self.threshold,
            weights: self.weights,
            rows: attributes
                .iter()
                .map(|attribute| self.score_attribute(ledger, attribute))
                .collect(),
        }
    }

    /// Score one attribute from the ledger series.
    #[must_use]
    pub fn score_attribute(&self, ledger: &MomentLedger, attribute: &str) -> StabilityResult {
        let [mean_cv, stddev_cv, kurtosis_cv] = StabilityMetric::all()
            .map(|metric| coefficient_of_variation(&ledger.series(attribute, metric)));
        let mean_si = score_cv_with(mean_cv, &self.cv_thresholds);
        let stddev_si = score_cv_with(stddev_cv, &self.cv_thresholds);
        let kurtosis_si = score_cv_with(kurtosis_cv, &self.cv_thresholds);

        let stability_index = weighted_index(&[
            (mean_si, self.weights.mean),
            (stddev_si, self.weights.stddev),
            (kurtosis_si, self.weights.kurtosis),
        ]);

        StabilityResult {
            attribute: attribute.to_string(),
            mean_cv,
            stddev_cv,
            kurtosis_cv,
            mean_si,
            stddev_si,
            kurtosis_si,
            stability_index,
            flagged: flag_unstable(stability_index, self.threshold),
        }
    }
}
