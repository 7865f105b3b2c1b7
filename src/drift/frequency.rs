//! Frequency tables, histogram alignment and the per-attribute frequency store.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binning::BinKey;
use crate::error::{DriftError, Result};

/// Probability assigned to bins that are empty or absent on one side.
pub const PROBABILITY_FLOOR: f64 = 0.0001;

/// Filename of the single partition written per attribute.
pub const PARTITION_FILENAME: &str = "part-00000.csv";

/// Share of rows per bin key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrequencyTable {
    probabilities: BTreeMap<BinKey, f64>,
}

impl FrequencyTable {
    /// Build a table from grouped counts and the dataset's total row count.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::EmptyDataset`] when `total_rows` is zero, since
    /// every probability would be a division by zero.
    pub fn from_counts(
        counts: &BTreeMap<BinKey, u64>,
        total_rows: usize,
        dataset: &str,
    ) -> Result<Self> {
        if total_rows == 0 {
            return Err(DriftError::EmptyDataset {
                dataset: dataset.to_string(),
            });
        }
        let total = total_rows as f64;
        Ok(Self {
            probabilities: counts
                .iter()
                .map(|(&bin, &count)| (bin, count as f64 / total))
                .collect(),
        })
    }

    /// Build a table from explicit probabilities.
    #[must_use]
    pub fn from_probabilities<I: IntoIterator<Item = (BinKey, f64)>>(entries: I) -> Self {
        Self {
            probabilities: entries.into_iter().collect(),
        }
    }

    /// Probability of a bin, if present.
    #[must_use]
    pub fn get(&self, bin: BinKey) -> Option<f64> {
        self.probabilities.get(&bin).copied()
    }

    /// Bins in ascending order.
    pub fn bins(&self) -> impl Iterator<Item = BinKey> + '_ {
        self.probabilities.keys().copied()
    }

    /// Number of bins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    /// Returns true if the table has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }
}

/// Source and target distributions over one shared, sorted bin ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedDistributions {
    /// Bin keys in ascending order.
    pub bins: Vec<BinKey>,
    /// Source (baseline) probabilities.
    pub p: Vec<f64>,
    /// Target probabilities.
    pub q: Vec<f64>,
}

/// Full-outer-align two frequency tables.
///
/// Bins missing on one side and bins with an exact-zero probability both
/// receive [`PROBABILITY_FLOOR`]. The result is ordered by bin key, which the
/// cumulative KS distance depends on.
#[must_use]
pub fn align(source: &FrequencyTable, target: &FrequencyTable) -> AlignedDistributions {
    let bins: Vec<BinKey> = source
        .bins()
        .chain(target.bins())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let floor = |value: Option<f64>| match value {
        Some(v) if v != 0.0 => v,
        _ => PROBABILITY_FLOOR,
    };

    let p = bins.iter().map(|&b| floor(source.get(b))).collect();
    let q = bins.iter().map(|&b| floor(target.get(b))).collect();
    AlignedDistributions { bins, p, q }
}

#[derive(Debug, Serialize, Deserialize)]
struct FrequencyRow {
    bin_value: BinKey,
    probability: f64,
}

/// Persisted source frequency tables, one directory per attribute.
///
/// Layout: `<model_root>/frequency_counts/<attribute>/part-00000.csv` with
/// columns `bin_value,probability`.
#[derive(Debug, Clone)]
pub struct FrequencyStore {
    root: PathBuf,
}

impl FrequencyStore {
    /// Create a store rooted at `<source_path>/<model_directory>`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(model_root: P) -> Self {
        Self {
            root: model_root.as_ref().join("frequency_counts"),
        }
    }

    /// Path of the table for an attribute.
    #[must_use]
    pub fn table_path(&self, attribute: &str) -> PathBuf {
        self.root.join(attribute).join(PARTITION_FILENAME)
    }

    /// Write (overwrite) the table for an attribute.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, attribute: &str, table: &FrequencyTable) -> Result<()> {
        let dir = self.root.join(attribute);
        std::fs::create_dir_all(&dir)?;

        let temp_path = dir.join(format!("{PARTITION_FILENAME}.tmp"));
        {
            let mut writer = csv::Writer::from_path(&temp_path)?;
            for (&bin_value, &probability) in &table.probabilities {
                writer.serialize(FrequencyRow {
                    bin_value,
                    probability,
                })?;
            }
            writer.flush()?;
        }
        std::fs::rename(&temp_path, self.table_path(attribute))?;

        debug!(attribute, bins = table.len(), "Saved source frequency table");
        Ok(())
    }

    /// Read the table for an attribute.
    ///
    /// # Errors
    ///
    /// Returns a data error if the table is missing or malformed.
    pub fn load(&self, attribute: &str) -> Result<FrequencyTable> {
        let path = self.table_path(attribute);
        if !path.exists() {
            return Err(DriftError::malformed(
                &path,
                format!("no stored frequency counts for attribute '{attribute}'"),
            ));
        }

        let mut reader = csv::Reader::from_path(&path)?;
        let mut probabilities = BTreeMap::new();
        for row in reader.deserialize() {
            let row: FrequencyRow = row?;
            if !row.probability.is_finite() || row.probability < 0.0 {
                return Err(DriftError::malformed(
                    &path,
                    format!("invalid probability {} for bin {}", row.probability, row.bin_value),
                ));
            }
            probabilities.insert(row.bin_value, row.probability);
        }
        Ok(FrequencyTable { probabilities })
    }
}
