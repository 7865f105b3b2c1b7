//! Attribute binning: turning numeric columns into discrete bin labels.
//!
//! Bin edges are trained once on the baseline dataset and the *same* edges
//! are applied to every comparison dataset, so both distributions are
//! quantized identically. Bins are labelled `1..=bin_size`; a value equal to
//! a cutoff falls into the lower bin. Missing values stay missing and are
//! grouped under [`MISSING_BIN`] when counted.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{Column, Dataset};
use crate::error::{DriftError, Result};

/// Label of a bin.
pub type BinKey = i64;

/// Bin key under which missing values are grouped.
pub const MISSING_BIN: BinKey = -1;

/// Default filename of a persisted binning model.
pub const MODEL_FILENAME: &str = "model.json";

/// Strategy used to place bin cutoffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinningMethod {
    /// Bins of equal width between the column minimum and maximum.
    #[default]
    EqualRange,
    /// Bins holding (roughly) the same number of rows.
    EqualFrequency,
}

impl FromStr for BinningMethod {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "equal_range" => Ok(Self::EqualRange),
            "equal_frequency" => Ok(Self::EqualFrequency),
            _ => Err(DriftError::invalid_config(
                "bin_method",
                format!("'{s}' is not one of: equal_range, equal_frequency"),
            )),
        }
    }
}

impl fmt::Display for BinningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EqualRange => write!(f, "equal_range"),
            Self::EqualFrequency => write!(f, "equal_frequency"),
        }
    }
}

/// Trained cutoffs for a set of attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningModel {
    /// Method the cutoffs were trained with.
    pub method: BinningMethod,
    /// Requested number of bins.
    pub bin_size: usize,
    /// When the model was trained.
    pub trained_at: DateTime<Utc>,
    /// Ascending interior cutoffs per attribute.
    pub cutoffs: BTreeMap<String, Vec<f64>>,
}

impl BinningModel {
    /// Cutoffs for an attribute.
    ///
    /// # Errors
    ///
    /// Returns an invalid-attribute error if the model was not trained on it.
    pub fn cutoffs_for(&self, attribute: &str) -> Result<&[f64]> {
        self.cutoffs
            .get(attribute)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                DriftError::invalid_attribute(attribute, "no trained bins in the binning model")
            })
    }
}

/// Binning collaborator.
pub trait Binner {
    /// Train cutoffs on `dataset` and return the binned dataset with the model.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid bin size or attribute.
    fn train(
        &self,
        dataset: &Dataset,
        attributes: &[String],
        method: BinningMethod,
        bin_size: usize,
    ) -> Result<(Dataset, BinningModel)>;

    /// Apply previously trained cutoffs to `dataset`.
    ///
    /// # Errors
    ///
    /// Returns an error if an attribute is missing from the model or dataset.
    fn apply(&self, dataset: &Dataset, attributes: &[String], model: &BinningModel)
        -> Result<Dataset>;
}

/// Default in-process binner.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeBinner;

impl AttributeBinner {
    /// Create a new binner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Binner for AttributeBinner {
    fn train(
        &self,
        dataset: &Dataset,
        attributes: &[String],
        method: BinningMethod,
        bin_size: usize,
    ) -> Result<(Dataset, BinningModel)> {
        if bin_size < 2 {
            return Err(DriftError::invalid_config(
                "bin_size",
                format!("must be at least 2, got {bin_size}"),
            ));
        }

        let mut cutoffs = BTreeMap::new();
        for attribute in attributes {
            let mut values: Vec<f64> = dataset
                .numeric(attribute)?
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            let edges = match method {
                BinningMethod::EqualRange => equal_range_cutoffs(&values, bin_size),
                BinningMethod::EqualFrequency => {
                    values.sort_by(f64::total_cmp);
                    equal_frequency_cutoffs(&values, bin_size)
                }
            };
            debug!(attribute = %attribute, cutoffs = ?edges, "Trained bin cutoffs");
            cutoffs.insert(attribute.clone(), edges);
        }

        let model = BinningModel {
            method,
            bin_size,
            trained_at: Utc::now(),
            cutoffs,
        };
        let binned = self.apply(dataset, attributes, &model)?;
        Ok((binned, model))
    }

    fn apply(
        &self,
        dataset: &Dataset,
        attributes: &[String],
        model: &BinningModel,
    ) -> Result<Dataset> {
        let mut binned = dataset.clone();
        for attribute in attributes {
            let cutoffs = model.cutoffs_for(attribute)?;
            let labels = dataset
                .numeric(attribute)?
                .iter()
                .map(|cell| cell.filter(|v| v.is_finite()).map(|v| bin_of(v, cutoffs) as f64))
                .collect();
            binned.set_column(attribute.clone(), Column::Numeric(labels));
        }
        Ok(binned)
    }
}

/// Interior cutoffs splitting `[min, max]` into `bin_size` equal-width bins.
#[must_use]
pub fn equal_range_cutoffs(values: &[f64], bin_size: usize) -> Vec<f64> {
    let Some(min) = values.iter().copied().reduce(f64::min) else {
        return Vec::new();
    };
    let max = values.iter().copied().fold(min, f64::max);
    let width = (max - min) / bin_size as f64;
    if width == 0.0 {
        return Vec::new();
    }
    (1..bin_size).map(|k| min + width * k as f64).collect()
}

/// Interior cutoffs at the `k / bin_size` quantiles of sorted `values`.
///
/// Duplicate cutoffs (heavy ties) are collapsed, so fewer bins may result.
#[must_use]
pub fn equal_frequency_cutoffs(sorted: &[f64], bin_size: usize) -> Vec<f64> {
    if sorted.is_empty() {
        return Vec::new();
    }
    let n = sorted.len() as f64;
    let mut cutoffs: Vec<f64> = (1..bin_size)
        .map(|k| {
            let rank = (k as f64 / bin_size as f64 * n).ceil() as usize;
            sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
        })
        .collect();
    cutoffs.dedup();
    cutoffs
}

/// Bin label (1-based) of `value` given ascending interior cutoffs.
#[must_use]
pub fn bin_of(value: f64, cutoffs: &[f64]) -> BinKey {
    let position = cutoffs.partition_point(|&c| c < value);
    position as BinKey + 1
}

/// Persists the binning model under `<model_root>/attribute_binning/`.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    /// Create a store rooted at `<source_path>/<model_directory>`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(model_root: P) -> Self {
        Self {
            dir: model_root.as_ref().join("attribute_binning"),
        }
    }

    /// Path of the model file.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILENAME)
    }

    /// Save the model, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, model: &BinningModel) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let temp_path = self.dir.join(format!("{MODEL_FILENAME}.tmp"));
        let json = serde_json::to_string_pretty(model)?;
        std::fs::write(&temp_path, json)?;
        std::fs::rename(&temp_path, self.model_path())?;

        info!(path = %self.model_path().display(), "Saved binning model");
        Ok(())
    }

    /// Load a previously saved model.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no model exists, or a JSON error if it
    /// is corrupted.
    pub fn load(&self) -> Result<BinningModel> {
        let path = self.model_path();
        if !path.exists() {
            return Err(DriftError::config_with_path(
                "no pre-existing binning model found",
                path,
            ));
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_equal_range_cutoffs() {
        let cutoffs = equal_range_cutoffs(&[0.0, 10.0, 5.0], 5);
        assert_eq!(cutoffs, vec![2.0, 4.0, 6.0, 8.0]);
        assert!(equal_range_cutoffs(&[3.0, 3.0], 4).is_empty());
        assert!(equal_range_cutoffs(&[], 4).is_empty());
    }

    #[test]
    fn test_equal_frequency_cutoffs() {
        let sorted: Vec<f64> = (1..=8).map(f64::from).collect();
        assert_eq!(equal_frequency_cutoffs(&sorted, 4), vec![2.0, 4.0, 6.0]);

        let ties = [1.0, 1.0, 1.0, 1.0, 2.0];
        assert_eq!(equal_frequency_cutoffs(&ties, 4), vec![1.0]);
    }

    #[test]
    fn test_bin_of_upper_inclusive() {
        let cutoffs = [2.0, 4.0];
        assert_eq!(bin_of(1.0, &cutoffs), 1);
        assert_eq!(bin_of(2.0, &cutoffs), 1);
        assert_eq!(bin_of(2.5, &cutoffs), 2);
        assert_eq!(bin_of(4.0, &cutoffs), 2);
        assert_eq!(bin_of(9.0, &cutoffs), 3);
        assert_eq!(bin_of(9.0, &[]), 1);
    }

    #[test]
    fn test_train_then_apply_uses_same_edges() {
        let source = Dataset::new("source").with_values("x", &[0.0, 2.5, 5.0, 7.5, 10.0]);
        let target = Dataset::new("target").with_numeric("x", vec![Some(-3.0), None, Some(11.0)]);
        let attrs = vec!["x".to_string()];

        let binner = AttributeBinner::new();
        let (binned_source, model) = binner
            .train(&source, &attrs, BinningMethod::EqualRange, 2)
            .unwrap();
        assert_eq!(model.cutoffs_for("x").unwrap(), &[5.0]);
        assert_eq!(
            binned_source.numeric("x").unwrap(),
            &[Some(1.0), Some(1.0), Some(1.0), Some(2.0), Some(2.0)]
        );

        let binned_target = binner.apply(&target, &attrs, &model).unwrap();
        assert_eq!(binned_target.numeric("x").unwrap(), &[Some(1.0), None, Some(2.0)]);
    }

    #[test]
    fn test_apply_sends_non_finite_to_missing_bin() {
        use crate::engine::{AggregationEngine, LocalEngine};

        let source = Dataset::new("source").with_values("x", &[0.0, 10.0]);
        let target = Dataset::new("target").with_values("x", &[f64::NAN, 1.0, f64::INFINITY]);
        let attrs = vec!["x".to_string()];

        let (_, model) = AttributeBinner
            .train(&source, &attrs, BinningMethod::EqualRange, 2)
            .unwrap();
        let binned = AttributeBinner.apply(&target, &attrs, &model).unwrap();
        assert_eq!(binned.numeric("x").unwrap(), &[None, Some(1.0), None]);

        let counts = LocalEngine.grouped_counts(&binned, "x").unwrap();
        assert_eq!(counts.get(&MISSING_BIN), Some(&0));
        assert_eq!(counts.get(&1), Some(&1));
    }

    #[test]
    fn test_train_rejects_small_bin_size() {
        let ds = Dataset::new("d").with_values("x", &[1.0, 2.0]);
        let err = AttributeBinner
            .train(&ds, &["x".to_string()], BinningMethod::EqualRange, 1)
            .unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_apply_unknown_attribute() {
        let model = BinningModel {
            method: BinningMethod::EqualRange,
            bin_size: 10,
            trained_at: Utc::now(),
            cutoffs: BTreeMap::new(),
        };
        let ds = Dataset::new("d").with_values("x", &[1.0]);
        assert!(AttributeBinner.apply(&ds, &["x".to_string()], &model).is_err());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(
            "equal_frequency".parse::<BinningMethod>().unwrap(),
            BinningMethod::EqualFrequency
        );
        assert!("quantile".parse::<BinningMethod>().is_err());
        assert_eq!(BinningMethod::EqualRange.to_string(), "equal_range");
    }

    #[test]
    fn test_model_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = ModelStore::new(temp.path().join("drift_statistics"));
        assert!(store.load().unwrap_err().is_config_error());

        let mut cutoffs = BTreeMap::new();
        cutoffs.insert("x".to_string(), vec![1.0, 2.0]);
        let model = BinningModel {
            method: BinningMethod::EqualFrequency,
            bin_size: 3,
            trained_at: Utc::now(),
            cutoffs,
        };
        store.save(&model).unwrap();
        assert_eq!(store.load().unwrap(), model);
    }
}
