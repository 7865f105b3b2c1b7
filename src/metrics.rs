//! Distributional distance metrics over aligned probability vectors.
//!
//! All functions expect two vectors of equal length that share the same bin
//! ordering and contain no zero entries. Zero flooring happens upstream when
//! the frequency tables are aligned (see [`crate::drift::frequency`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DriftError, Result};

/// Drift metric selectable for a drift run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriftMetric {
    /// Population Stability Index.
    #[serde(rename = "PSI")]
    Psi,
    /// Jensen-Shannon divergence.
    #[serde(rename = "JSD")]
    Jsd,
    /// Hellinger distance.
    #[serde(rename = "HD")]
    Hd,
    /// Binned Kolmogorov-Smirnov distance.
    #[serde(rename = "KS")]
    Ks,
}

impl DriftMetric {
    /// Returns all metrics in canonical order.
    #[must_use]
    pub fn all() -> [DriftMetric; 4] {
        [Self::Psi, Self::Jsd, Self::Hd, Self::Ks]
    }

    /// Column name used in output tables.
    #[must_use]
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Psi => "PSI",
            Self::Jsd => "JSD",
            Self::Hd => "HD",
            Self::Ks => "KS",
        }
    }

    /// Parse a metric selection.
    ///
    /// Accepts a single name, `"all"`, or a pipe-delimited list such as
    /// `"PSI|KS"`. Duplicates are dropped while keeping first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`DriftError::UnknownMetric`] for any unrecognized name, or a
    /// configuration error when the selection is empty.
    pub fn parse_list(selection: &str) -> Result<Vec<DriftMetric>> {
        let mut metrics = Vec::new();
        for token in selection.split('|').map(str::trim).filter(|t| !t.is_empty()) {
            if token.eq_ignore_ascii_case("all") {
                for metric in Self::all() {
                    if !metrics.contains(&metric) {
                        metrics.push(metric);
                    }
                }
                continue;
            }
            let metric: DriftMetric = token.parse()?;
            if !metrics.contains(&metric) {
                metrics.push(metric);
            }
        }
        if metrics.is_empty() {
            return Err(DriftError::invalid_config(
                "method_type",
                "at least one drift metric must be selected",
            ));
        }
        Ok(metrics)
    }

    /// Compute this metric after checking that the vectors are aligned.
    ///
    /// # Errors
    ///
    /// Returns a data error if the vectors differ in length or are empty.
    pub fn compute(&self, p: &[f64], q: &[f64]) -> Result<f64> {
        if p.len() != q.len() {
            return Err(DriftError::data(format!(
                "probability vectors are not aligned ({} vs {} bins)",
                p.len(),
                q.len()
            )));
        }
        if p.is_empty() {
            return Err(DriftError::data("probability vectors are empty"));
        }
        Ok(match self {
            Self::Psi => psi(p, q),
            Self::Jsd => js_divergence(p, q),
            Self::Hd => hellinger(p, q),
            Self::Ks => ks(p, q),
        })
    }
}

impl FromStr for DriftMetric {
    type Err = DriftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PSI" => Ok(Self::Psi),
            "JSD" => Ok(Self::Jsd),
            "HD" => Ok(Self::Hd),
            "KS" => Ok(Self::Ks),
            _ => Err(DriftError::UnknownMetric {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for DriftMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

/// Population Stability Index: `Σ (q - p) · ln(q / p)`.
pub fn psi(p: &[f64], q: &[f64]) -> f64 {
    p.iter()
        .zip(q)
        .map(|(&pi, &qi)| (qi - pi) * (qi / pi).ln())
        .sum()
}

/// Jensen-Shannon divergence with natural logarithms, bounded by `ln 2`.
pub fn js_divergence(p: &[f64], q: &[f64]) -> f64 {
    let (mut pm, mut qm) = (0.0, 0.0);
    for (&pi, &qi) in p.iter().zip(q) {
        let m = (pi + qi) / 2.0;
        pm += pi * (pi / m).ln();
        qm += qi * (qi / m).ln();
    }
    (pm + qm) / 2.0
}

/// Hellinger distance, bounded in `[0, 1]`.
pub fn hellinger(p: &[f64], q: &[f64]) -> f64 {
    let squared: f64 = p
        .iter()
        .zip(q)
        .map(|(&pi, &qi)| (pi.sqrt() - qi.sqrt()).powi(2))
        .sum();
    squared.sqrt() / std::f64::consts::SQRT_2
}

/// Maximum absolute gap between the cumulative sums of `p` and `q`.
///
/// This is the Kolmogorov-Smirnov statistic restricted to the binned support,
/// so it is only meaningful when both vectors follow the bin-key order.
pub fn ks(p: &[f64], q: &[f64]) -> f64 {
    let (mut cp, mut cq, mut max_gap) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&pi, &qi) in p.iter().zip(q) {
        cp += pi;
        cq += qi;
        max_gap = max_gap.max((cp - cq).abs());
    }
    max_gap
}

/// Round to 4 decimal places, the precision of every reported statistic.
#[must_use]
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_identical_vectors_have_zero_distance() {
        let p = [0.2, 0.3, 0.5];
        assert!(psi(&p, &p).abs() < EPS);
        assert!(js_divergence(&p, &p).abs() < EPS);
        assert!(hellinger(&p, &p).abs() < EPS);
        assert!(ks(&p, &p).abs() < EPS);
    }

    #[test]
    fn test_psi_known_value() {
        let p = [0.5, 0.5];
        let q = [0.9, 0.1];
        assert!((round4(psi(&p, &q)) - 0.8789).abs() < EPS);
    }

    #[test]
    fn test_divergences_are_symmetric() {
        let p = [0.7, 0.2, 0.1];
        let q = [0.1, 0.3, 0.6];
        assert!((js_divergence(&p, &q) - js_divergence(&q, &p)).abs() < EPS);
        assert!((hellinger(&p, &q) - hellinger(&q, &p)).abs() < EPS);
        // (q - p) ln(q / p) is invariant under swapping p and q
        assert!((psi(&p, &q) - psi(&q, &p)).abs() < EPS);
    }

    #[test]
    fn test_bounds_near_disjoint_support() {
        let p = [0.9998, 0.0001, 0.0001];
        let q = [0.0001, 0.0001, 0.9998];
        let hd = hellinger(&p, &q);
        let k = ks(&p, &q);
        assert!((0.0..=1.0).contains(&hd));
        assert!((0.0..=1.0).contains(&k));
        assert!(js_divergence(&p, &q) <= std::f64::consts::LN_2 + 1e-9);
    }

    #[test]
    fn test_ks_uses_cumulative_order() {
        let p = [0.5, 0.0001, 0.4999];
        let q = [0.0001, 0.5, 0.4999];
        assert!((ks(&p, &q) - 0.4999).abs() < 1e-9);
    }

    #[test]
    fn test_parse_list_variants() {
        assert_eq!(DriftMetric::parse_list("PSI").unwrap(), vec![DriftMetric::Psi]);
        assert_eq!(
            DriftMetric::parse_list("ks|psi").unwrap(),
            vec![DriftMetric::Ks, DriftMetric::Psi]
        );
        assert_eq!(DriftMetric::parse_list("all").unwrap().len(), 4);
        assert_eq!(
            DriftMetric::parse_list("PSI|all").unwrap(),
            DriftMetric::all().to_vec()
        );
    }

    #[test]
    fn test_parse_list_rejects_unknown() {
        let err = DriftMetric::parse_list("PSI|WASSERSTEIN").unwrap_err();
        assert!(matches!(err, DriftError::UnknownMetric { .. }));
        assert!(err.is_config_error());
        assert!(DriftMetric::parse_list(" | ").is_err());
    }

    #[test]
    fn test_compute_rejects_misaligned() {
        let err = DriftMetric::Psi.compute(&[0.5, 0.5], &[1.0]).unwrap_err();
        assert!(err.is_data_error());
    }

    #[test]
    fn test_round4() {
        assert!((round4(0.123_456) - 0.1235).abs() < EPS);
        assert!((round4(1.8) - 1.8).abs() < EPS);
    }
}
