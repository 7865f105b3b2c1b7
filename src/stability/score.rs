//! Coefficient of variation and its mapping to a 0-4 stability sub-score.
//!
//! Everything here is a pure function. Null inputs propagate as `None`
//! instead of raising, so a degenerate series ends up flagged rather than
//! aborting the run.

use serde::{Deserialize, Serialize};

use crate::metrics::round4;

/// Ascending right-open CV cutoffs.
///
/// With `n` cutoffs, `|cv|` below the first scores `n`, each cutoff crossed
/// costs one point, and anything at or beyond the last scores 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvThresholds {
    cutoffs: Vec<f64>,
}

impl Default for CvThresholds {
    fn default() -> Self {
        Self {
            cutoffs: vec![0.03, 0.1, 0.2, 0.5],
        }
    }
}

impl CvThresholds {
    /// Custom cutoffs. They are sorted ascending.
    #[must_use]
    pub fn new(mut cutoffs: Vec<f64>) -> Self {
        cutoffs.sort_by(f64::total_cmp);
        Self { cutoffs }
    }

    /// Highest attainable sub-score.
    #[must_use]
    pub fn max_score(&self) -> u8 {
        u8::try_from(self.cutoffs.len()).unwrap_or(u8::MAX)
    }

    /// Sub-score for a coefficient of variation.
    #[must_use]
    pub fn score(&self, cv: f64) -> u8 {
        let magnitude = cv.abs();
        let crossed = self.cutoffs.partition_point(|&c| c <= magnitude);
        self.max_score().saturating_sub(u8::try_from(crossed).unwrap_or(u8::MAX))
    }

    /// Cutoffs in ascending order.
    #[must_use]
    pub fn cutoffs(&self) -> &[f64] {
        &self.cutoffs
    }
}

/// Population standard deviation over mean, rounded to 4 decimals.
///
/// `None` when the series is empty, contains a null, has a zero mean or
/// produces a non-finite ratio.
#[must_use]
pub fn coefficient_of_variation(series: &[Option<f64>]) -> Option<f64> {
    if series.is_empty() {
        return None;
    }
    let values: Vec<f64> = series.iter().copied().collect::<Option<_>>()?;
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean == 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let cv = round4(variance.sqrt() / mean);
    cv.is_finite().then_some(cv)
}

/// Sub-score for an optional CV with the default cutoffs.
#[must_use]
pub fn score_cv(cv: Option<f64>) -> Option<u8> {
    score_cv_with(cv, &CvThresholds::default())
}

/// Sub-score for an optional CV with custom cutoffs.
#[must_use]
pub fn score_cv_with(cv: Option<f64>, thresholds: &CvThresholds) -> Option<u8> {
    cv.filter(|c| c.is_finite()).map(|c| thresholds.score(c))
}

/// `Σ weight · sub_score`, rounded to 4 decimals; `None` if any sub-score is.
#[must_use]
pub fn weighted_index(parts: &[(Option<u8>, f64)]) -> Option<f64> {
    let mut total = 0.0;
    for (score, weight) in parts {
        total += f64::from((*score)?) * weight;
    }
    Some(round4(total))
}

/// 1 when the index is null or below the threshold, else 0.
#[must_use]
pub fn flag_unstable(index: Option<f64>, threshold: f64) -> u8 {
    match index {
        Some(value) if value >= threshold => 0,
        _ => 1,
    }
}
