//! Moment ledger: per-period, per-attribute summary statistics.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::StabilityMetric;
use crate::engine::ColumnMoments;
use crate::error::{DriftError, Result};

/// One ledger row.
///
/// Kurtosis is stored in the Pearson convention (normal = 3). Nulls are
/// written as empty CSV fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentRecord {
    /// 1-based period index.
    pub idx: u32,
    /// Attribute name.
    pub attribute: String,
    /// Period mean.
    pub mean: Option<f64>,
    /// Period sample standard deviation.
    pub stddev: Option<f64>,
    /// Period Pearson kurtosis.
    pub kurtosis: Option<f64>,
}

impl MomentRecord {
    /// Build a record from engine moments, converting excess kurtosis to
    /// Pearson and dropping non-finite values to null.
    #[must_use]
    pub fn from_moments(idx: u32, attribute: impl Into<String>, moments: &ColumnMoments) -> Self {
        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        Self {
            idx,
            attribute: attribute.into(),
            mean: finite(moments.mean),
            stddev: finite(moments.stddev),
            kurtosis: finite(moments.excess_kurtosis.map(|k| k + 3.0)),
        }
    }

    /// Value of one statistic.
    #[must_use]
    pub fn value(&self, metric: StabilityMetric) -> Option<f64> {
        match metric {
            StabilityMetric::Mean => self.mean,
            StabilityMetric::Stddev => self.stddev,
            StabilityMetric::Kurtosis => self.kurtosis,
        }
    }
}

/// Moments of every attribute for one new period, in attribute order.
pub type PeriodMoments = Vec<(String, ColumnMoments)>;

/// Append-only collection of [`MomentRecord`]s.
///
/// Appending never mutates: [`MomentLedger::append_periods`] returns a new
/// ledger holding the historical rows unchanged followed by the new ones.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MomentLedger {
    records: Vec<MomentRecord>,
}

impl MomentLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger from existing rows.
    ///
    /// # Errors
    ///
    /// Returns a data error for a zero period index or a duplicated
    /// `(idx, attribute)` pair.
    pub fn from_records(records: Vec<MomentRecord>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for record in &records {
            if record.idx == 0 {
                return Err(DriftError::data(format!(
                    "ledger period index must be >= 1 (attribute '{}')",
                    record.attribute
                )));
            }
            if !seen.insert((record.idx, record.attribute.as_str())) {
                return Err(DriftError::data(format!(
                    "duplicate ledger row for period {} attribute '{}'",
                    record.idx, record.attribute
                )));
            }
        }
        Ok(Self { records })
    }

    /// All rows in insertion order.
    #[must_use]
    pub fn records(&self) -> &[MomentRecord] {
        &self.records
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the ledger has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Highest period index, 0 when empty.
    #[must_use]
    pub fn max_period(&self) -> u32 {
        self.records.iter().map(|r| r.idx).max().unwrap_or(0)
    }

    /// Distinct period indices in ascending order.
    #[must_use]
    pub fn periods(&self) -> Vec<u32> {
        self.records
            .iter()
            .map(|r| r.idx)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct attribute names in first-seen order.
    #[must_use]
    pub fn attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for record in &self.records {
            if !names.contains(&record.attribute.as_str()) {
                names.push(&record.attribute);
            }
        }
        names
    }

    /// Row for a period and attribute.
    #[must_use]
    pub fn record(&self, idx: u32, attribute: &str) -> Option<&MomentRecord> {
        self.records
            .iter()
            .find(|r| r.idx == idx && r.attribute == attribute)
    }

    /// Chronological series of one statistic for an attribute.
    #[must_use]
    pub fn series(&self, attribute: &str, metric: StabilityMetric) -> Vec<Option<f64>> {
        let mut rows: Vec<&MomentRecord> = self
            .records
            .iter()
            .filter(|r| r.attribute == attribute)
            .collect();
        rows.sort_by_key(|r| r.idx);
        rows.into_iter().map(|r| r.value(metric)).collect()
    }

    /// Return a new ledger with `periods` appended.
    ///
    /// Period indices continue from [`MomentLedger::max_period`], one per
    /// entry of `periods`, in order.
    #[must_use]
    pub fn append_periods(&self, periods: &[PeriodMoments]) -> Self {
        let start = self.max_period();
        let mut records = self.records.clone();
        for (offset, period) in (1u32..).zip(periods) {
            let idx = start + offset;
            records.extend(
                period
                    .iter()
                    .map(|(attribute, moments)| MomentRecord::from_moments(idx, attribute, moments)),
            );
        }
        debug!(
            previous = start,
            appended = periods.len(),
            rows = records.len(),
            "Appended ledger periods"
        );
        Self { records }
    }
}

/// CSV persistence for a [`MomentLedger`].
///
/// Columns are `idx,attribute,mean,stddev,kurtosis`. Every save rewrites the
/// whole file through a temporary sibling and a rename.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    /// Create a store for the file at `path`.
    #[must_use]
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Path of the ledger file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the ledger file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the full ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, ledger: &MomentLedger) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);
        {
            let mut writer = csv::Writer::from_path(&temp_path)?;
            for record in ledger.records() {
                writer.serialize(record)?;
            }
            writer.flush()?;
        }
        std::fs::rename(&temp_path, &self.path)?;

        info!(path = %self.path.display(), rows = ledger.len(), "Saved moment ledger");
        Ok(())
    }

    /// Read the ledger.
    ///
    /// # Errors
    ///
    /// Returns a data error if the file is missing or malformed.
    pub fn load(&self) -> Result<MomentLedger> {
        if !self.path.exists() {
            return Err(DriftError::malformed(&self.path, "ledger file does not exist"));
        }
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut records = Vec::new();
        for row in reader.deserialize() {
            let mut record: MomentRecord = row?;
            record.mean = record.mean.filter(|v| v.is_finite());
            record.stddev = record.stddev.filter(|v| v.is_finite());
            record.kurtosis = record.kurtosis.filter(|v| v.is_finite());
            records.push(record);
        }
        MomentLedger::from_records(records)
            .map_err(|e| DriftError::malformed(&self.path, e.to_string()))
    }

    /// Read the ledger, or an empty one when the file does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a data error if the file exists but is malformed.
    pub fn load_or_default(&self) -> Result<MomentLedger> {
        if self.exists() {
            self.load()
        } else {
            Ok(MomentLedger::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn moments(mean: f64) -> ColumnMoments {
        ColumnMoments {
            mean: Some(mean),
            stddev: Some(1.0),
            excess_kurtosis: Some(0.0),
        }
    }

    fn period(mean: f64) -> PeriodMoments {
        vec![
            ("a".to_string(), moments(mean)),
            ("b".to_string(), moments(mean * 2.0)),
        ]
    }

    #[test]
    fn test_from_moments_converts_kurtosis() {
        let record = MomentRecord::from_moments(1, "a", &moments(2.0));
        assert_eq!(record.kurtosis, Some(3.0));

        let degenerate = ColumnMoments {
            mean: Some(f64::INFINITY),
            stddev: None,
            excess_kurtosis: None,
        };
        let record = MomentRecord::from_moments(1, "a", &degenerate);
        assert_eq!(record.mean, None);
        assert_eq!(record.kurtosis, None);
    }

    #[test]
    fn test_append_continues_indices_and_keeps_history() {
        let first = MomentLedger::new().append_periods(&[period(1.0), period(2.0)]);
        assert_eq!(first.max_period(), 2);

        let second = first.append_periods(&[period(3.0)]);
        assert_eq!(second.periods(), vec![1, 2, 3]);
        assert_eq!(&second.records()[..first.len()], first.records());
        assert_eq!(first.len(), 4);
        assert_eq!(
            second.series("b", StabilityMetric::Mean),
            vec![Some(2.0), Some(4.0), Some(6.0)]
        );
        assert_eq!(second.attributes(), vec!["a", "b"]);
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let record = MomentRecord::from_moments(1, "a", &moments(1.0));
        assert!(MomentLedger::from_records(vec![record.clone(), record])
            .unwrap_err()
            .is_data_error());
        let zero = MomentRecord::from_moments(0, "a", &moments(1.0));
        assert!(MomentLedger::from_records(vec![zero]).is_err());
    }

    #[test]
    fn test_store_roundtrip_with_nulls() {
        let temp = TempDir::new().unwrap();
        let store = LedgerStore::new(temp.path().join("stats/ledger.csv"));
        let degenerate = ColumnMoments {
            mean: Some(4.0),
            stddev: Some(0.0),
            excess_kurtosis: None,
        };
        let ledger = MomentLedger::new()
            .append_periods(&[vec![("a".to_string(), moments(1.5)), ("c".to_string(), degenerate)]]);

        store.save(&ledger).unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("idx,attribute,mean,stddev,kurtosis"));
        assert!(content.contains("1,c,4.0,0.0,\n"));

        assert_eq!(store.load().unwrap(), ledger);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = LedgerStore::new(temp.path().join("missing.csv"));
        assert!(store.load_or_default().unwrap().is_empty());
        assert!(store.load().unwrap_err().is_data_error());
    }
}
