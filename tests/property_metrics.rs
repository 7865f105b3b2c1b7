//! Property tests for drift metrics and stability scoring
//!
//! Ensures the statistics satisfy their mathematical invariants:
//! - Divergences vanish on identical distributions
//! - Symmetric metrics are symmetric, bounded metrics stay in bounds
//! - CV scores are monotone in |CV| and confined to 0..=4
//! - Ledger appends number periods consecutively

use driftwatch::drift::any_exceeds;
use driftwatch::expr::Bindings;
use driftwatch::metrics::{hellinger, js_divergence, ks, psi};
use driftwatch::stability::{coefficient_of_variation, score_cv, MomentLedger, PeriodMoments};
use driftwatch::{ColumnMoments, DriftMetric};
use proptest::collection::vec;
use proptest::prelude::*;

// =============================================================================
// Strategy Helpers
// =============================================================================

/// Generate a probability vector with strictly positive entries
fn distribution(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    vec(0.001f64..1.0, len).prop_map(|raw| {
        let total: f64 = raw.iter().sum();
        raw.into_iter().map(|v| v / total).collect()
    })
}

/// Generate two probability vectors over the same bins
fn distribution_pair(len: std::ops::Range<usize>) -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    len.prop_flat_map(|l| (distribution(l..l + 1), distribution(l..l + 1)))
}

fn period(attributes: &[String], mean: f64) -> PeriodMoments {
    attributes
        .iter()
        .map(|a| {
            (
                a.clone(),
                ColumnMoments {
                    mean: Some(mean),
                    stddev: Some(1.0),
                    excess_kurtosis: Some(0.0),
                },
            )
        })
        .collect()
}

// =============================================================================
// Drift Metric Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn prop_identical_distributions_have_zero_drift(p in distribution(1..30)) {
        for metric in DriftMetric::all() {
            let value = metric.compute(&p, &p).unwrap();
            prop_assert!(value.abs() < 1e-12, "{} of identical inputs was {}", metric, value);
        }
    }

    #[test]
    fn prop_psi_jsd_hd_symmetric((p, q) in distribution_pair(1..30)) {
        prop_assert!((psi(&p, &q) - psi(&q, &p)).abs() < 1e-9);
        prop_assert!((js_divergence(&p, &q) - js_divergence(&q, &p)).abs() < 1e-12);
        prop_assert!((hellinger(&p, &q) - hellinger(&q, &p)).abs() < 1e-12);
    }

    #[test]
    fn prop_metrics_bounded((p, q) in distribution_pair(1..30)) {
        let psi_value = psi(&p, &q);
        let jsd = js_divergence(&p, &q);
        let hd = hellinger(&p, &q);
        let ks_value = ks(&p, &q);

        prop_assert!(psi_value >= -1e-12, "PSI {} negative", psi_value);
        prop_assert!((-1e-12..=std::f64::consts::LN_2 + 1e-12).contains(&jsd), "JSD {} out of [0, ln 2]", jsd);
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&hd), "HD {} out of [0, 1]", hd);
        prop_assert!((-1e-12..=1.0 + 1e-12).contains(&ks_value), "KS {} out of [0, 1]", ks_value);
        for value in [psi_value, jsd, hd, ks_value] {
            prop_assert!(value.is_finite());
        }
    }

    #[test]
    fn prop_mismatched_lengths_rejected(
        p in distribution(1..10),
        q in distribution(11..20),
    ) {
        for metric in DriftMetric::all() {
            prop_assert!(metric.compute(&p, &q).is_err());
        }
    }

    #[test]
    fn prop_any_exceeds_matches_maximum(
        scores in vec(0.0f64..1.0, 0..8),
        threshold in 0.0f64..1.0,
    ) {
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        prop_assert_eq!(any_exceeds(&scores, threshold), max > threshold);
    }
}

// =============================================================================
// Stability Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn prop_score_cv_monotone(a in -2.0f64..2.0, b in -2.0f64..2.0) {
        let (lo, hi) = if a.abs() <= b.abs() { (a, b) } else { (b, a) };
        let lo_score = score_cv(Some(lo)).unwrap();
        let hi_score = score_cv(Some(hi)).unwrap();
        prop_assert!(lo_score >= hi_score);
        prop_assert!(hi_score <= 4);
    }

    #[test]
    fn prop_cv_scale_invariant(
        series in vec(1.0f64..100.0, 2..12),
        factor in 0.5f64..20.0,
    ) {
        let base: Vec<Option<f64>> = series.iter().map(|&v| Some(v)).collect();
        let scaled: Vec<Option<f64>> = series.iter().map(|&v| Some(v * factor)).collect();
        let a = coefficient_of_variation(&base).unwrap();
        let b = coefficient_of_variation(&scaled).unwrap();
        prop_assert!((a - b).abs() <= 2e-4, "CV {} vs scaled {}", a, b);
        prop_assert!(a >= 0.0);
    }

    #[test]
    fn prop_cv_null_propagates(series in vec(1.0f64..100.0, 1..12), hole in any::<prop::sample::Index>()) {
        let mut cells: Vec<Option<f64>> = series.iter().map(|&v| Some(v)).collect();
        let i = hole.index(cells.len());
        cells[i] = None;
        prop_assert_eq!(coefficient_of_variation(&cells), None);
    }

    #[test]
    fn prop_ledger_append_numbers_periods(
        prior_periods in 0usize..4,
        new_periods in 1usize..4,
        attribute_count in 1usize..4,
    ) {
        let attributes: Vec<String> = (0..attribute_count).map(|i| format!("a{i}")).collect();
        let prior_batch: Vec<PeriodMoments> = (0..prior_periods).map(|i| period(&attributes, i as f64)).collect();
        let prior = MomentLedger::new().append_periods(&prior_batch);
        let new_batch: Vec<PeriodMoments> = (0..new_periods).map(|i| period(&attributes, i as f64)).collect();
        let ledger = prior.append_periods(&new_batch);

        prop_assert_eq!(ledger.max_period() as usize, prior_periods + new_periods);
        prop_assert_eq!(ledger.len(), (prior_periods + new_periods) * attribute_count);
        let expected: Vec<u32> = (1..=(prior_periods + new_periods) as u32).collect();
        prop_assert_eq!(ledger.periods(), expected);
        // prior rows are kept untouched
        prop_assert_eq!(&ledger.records()[..prior.len()], prior.records());
    }
}

// =============================================================================
// Formula Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prop_polynomial_derivative_matches_closed_form(
        a in -10.0f64..10.0,
        b in -10.0f64..10.0,
        x in -10.0f64..10.0,
    ) {
        let formula = driftwatch::expr::Formula::parse("a*x**2 + b*x").unwrap();
        let derivative = formula.derivative("x");
        let bindings: Bindings = [("a".to_string(), a), ("b".to_string(), b), ("x".to_string(), x)].into();
        let value = derivative.eval(&bindings).unwrap();
        prop_assert!((value - (2.0 * a * x + b)).abs() < 1e-9);
    }
}
