//! Drift detector: bins both datasets identically and scores each attribute.

use tracing::{debug, info};

use super::frequency::{align, FrequencyStore, FrequencyTable};
use super::types::{any_exceeds, DriftOptions, DriftReport, DriftResult, MetricScore};
use crate::binning::{Binner, ModelStore};
use crate::dataset::{AttributeSelection, Dataset};
use crate::engine::AggregationEngine;
use crate::error::{DriftError, Result};
use crate::metrics::round4;

/// Computes drift statistics between a baseline and a target dataset.
///
/// The detector owns no data; every call to [`DriftDetector::statistics`] is
/// self-contained. Baseline artefacts (binning model and source frequency
/// counts) are written under [`DriftOptions::model_root`] so later runs can
/// reuse them with `pre_existing_source`.
pub struct DriftDetector<'a, E: AggregationEngine, B: Binner> {
    engine: &'a E,
    binner: &'a B,
    options: DriftOptions,
}

impl<'a, E: AggregationEngine, B: Binner> DriftDetector<'a, E, B> {
    /// Create a detector over the given collaborators.
    pub fn new(engine: &'a E, binner: &'a B, options: DriftOptions) -> Self {
        Self {
            engine,
            binner,
            options,
        }
    }

    /// Options this detector runs with.
    pub fn options(&self) -> &DriftOptions {
        &self.options
    }

    /// Compute per-attribute drift of `target` against the baseline.
    ///
    /// `source` is required unless `pre_existing_source` is set, in which case
    /// it is ignored and the persisted baseline is used.
    ///
    /// # Errors
    ///
    /// Configuration errors (bad options, unknown or non-numeric attributes,
    /// missing source) are raised before any aggregation. A zero-row dataset
    /// is a data error.
    pub fn statistics(
        &self,
        target: &Dataset,
        source: Option<&Dataset>,
        selection: &AttributeSelection,
    ) -> Result<DriftReport> {
        self.options.validate()?;
        let attributes = selection.resolve(target)?;
        let source = match (self.options.pre_existing_source, source) {
            (true, _) => None,
            (false, Some(source)) => Some(source),
            (false, None) => {
                return Err(DriftError::config(
                    "a source dataset is required unless pre_existing_source is set",
                ))
            }
        };

        // row counts are checked before anything is trained or written
        let target_rows = self.engine.row_count(target)?;
        if target_rows == 0 {
            return Err(DriftError::EmptyDataset {
                dataset: target.name().to_string(),
            });
        }
        let source_rows = match source {
            Some(source) => {
                let rows = self.engine.row_count(source)?;
                if rows == 0 {
                    return Err(DriftError::EmptyDataset {
                        dataset: source.name().to_string(),
                    });
                }
                Some(rows)
            }
            None => None,
        };

        let model_root = self.options.model_root();
        let model_store = ModelStore::new(&model_root);
        let frequency_store = FrequencyStore::new(&model_root);

        let (source_binned, model) = match source {
            Some(source) => {
                let (binned, model) = self.binner.train(
                    source,
                    &attributes,
                    self.options.bin_method,
                    self.options.bin_size,
                )?;
                (Some(binned), model)
            }
            None => (None, model_store.load()?),
        };
        let target_binned = self.binner.apply(target, &attributes, &model)?;

        let mut fresh_tables = Vec::new();
        let mut rows = Vec::with_capacity(attributes.len());
        for attribute in &attributes {
            let source_table = match (&source_binned, source_rows) {
                (Some(binned), Some(total)) => {
                    let counts = self.engine.grouped_counts(binned, attribute)?;
                    let table = FrequencyTable::from_counts(&counts, total, binned.name())?;
                    fresh_tables.push((attribute, table.clone()));
                    table
                }
                _ => frequency_store.load(attribute)?,
            };
            let counts = self.engine.grouped_counts(&target_binned, attribute)?;
            let target_table = FrequencyTable::from_counts(&counts, target_rows, target.name())?;

            let aligned = align(&source_table, &target_table);
            let mut scores = Vec::with_capacity(self.options.metrics.len());
            for metric in &self.options.metrics {
                let value = round4(metric.compute(&aligned.p, &aligned.q)?);
                scores.push(MetricScore {
                    metric: *metric,
                    value,
                });
            }

            let values: Vec<f64> = scores.iter().map(|s| s.value).collect();
            let flagged = u8::from(any_exceeds(&values, self.options.threshold));
            debug!(attribute = %attribute, bins = aligned.bins.len(), ?values, flagged, "Scored attribute drift");

            rows.push(DriftResult {
                attribute: attribute.clone(),
                scores,
                flagged,
            });
        }

        // a baseline is persisted only once every attribute has been scored,
        // so a failed run never leaves a model out of step with its tables
        if source_binned.is_some() {
            model_store.save(&model)?;
            for (attribute, table) in &fresh_tables {
                frequency_store.save(attribute, table)?;
            }
        }

        // stable: attribute order is kept within each flag group
        rows.sort_by(|a, b| b.flagged.cmp(&a.flagged));

        let report = DriftReport {
            metrics: self.options.metrics.clone(),
            threshold: self.options.threshold,
            rows,
        };
        info!(
            attributes = report.rows.len(),
            drifted = report.drifted_count(),
            threshold = report.threshold,
            "Drift statistics computed"
        );
        Ok(report)
    }
}
