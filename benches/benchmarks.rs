//! Benchmark suite for driftwatch.
//!
//! This module provides performance benchmarks for:
//! - Drift metrics over aligned distributions
//! - Binning and end-to-end drift statistics
//! - Stability scoring over a moment ledger
//! - Derived-feature moment estimation
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Save baseline for comparison
//! cargo bench -- --save-baseline main
//!
//! # Compare against baseline
//! cargo bench -- --baseline main
//! ```
//!
//! Criterion writes JSON estimates and HTML reports under `target/criterion/`.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::TempDir;

use driftwatch::drift::{align, FrequencyTable};
use driftwatch::stability::{MomentLedger, PeriodMoments};
use driftwatch::{
    AttributeBinner, AttributeSelection, ColumnMoments, Dataset, DriftDetector, DriftMetric,
    DriftOptions, FeatureStabilityEstimator, FeatureTransformation, LocalEngine,
    StabilityAggregator,
};

// ============================================================================
// Fixtures
// ============================================================================

/// Deterministic pseudo-random values in `[0, 100)`.
fn values(len: usize, seed: u64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..len)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 11) as f64 / (1u64 << 53) as f64 * 100.0
        })
        .collect()
}

fn distribution(bins: usize, seed: u64) -> FrequencyTable {
    let raw = values(bins, seed);
    let total: f64 = raw.iter().sum();
    FrequencyTable::from_probabilities(raw.into_iter().enumerate().map(|(i, v)| (i as i64 + 1, v / total)))
}

fn dataset(name: &str, rows: usize, attributes: usize, seed: u64) -> Dataset {
    (0..attributes).fold(Dataset::new(name), |ds, a| {
        ds.with_values(format!("attr_{a}"), &values(rows, seed + a as u64))
    })
}

fn ledger(periods: usize, attributes: usize) -> MomentLedger {
    let batch: Vec<PeriodMoments> = (0..periods)
        .map(|p| {
            (0..attributes)
                .map(|a| {
                    let drift = values(2, (p * attributes + a) as u64);
                    (
                        format!("attr_{a}"),
                        ColumnMoments {
                            mean: Some(50.0 + drift[0] / 10.0),
                            stddev: Some(10.0 + drift[1] / 20.0),
                            excess_kurtosis: Some(0.1),
                        },
                    )
                })
                .collect()
        })
        .collect();
    MomentLedger::new().append_periods(&batch)
}

// ============================================================================
// Drift Benchmarks
// ============================================================================

fn bench_metrics(c: &mut Criterion) {
    let mut group = c.benchmark_group("drift_metrics");

    for bins in [10, 100, 1_000] {
        let aligned = align(&distribution(bins, 1), &distribution(bins, 2));
        group.throughput(Throughput::Elements(bins as u64));
        for metric in DriftMetric::all() {
            group.bench_with_input(
                BenchmarkId::new(metric.column_name(), bins),
                &aligned,
                |b, aligned| b.iter(|| black_box(metric.compute(&aligned.p, &aligned.q))),
            );
        }
    }

    group.finish();
}

fn bench_align(c: &mut Criterion) {
    let mut group = c.benchmark_group("align");

    for bins in [10, 100, 1_000] {
        let source = distribution(bins, 3);
        let target = distribution(bins / 2 + 1, 4);
        group.bench_with_input(BenchmarkId::from_parameter(bins), &bins, |b, _| {
            b.iter(|| black_box(align(black_box(&source), black_box(&target))))
        });
    }

    group.finish();
}

fn bench_drift_statistics(c: &mut Criterion) {
    let mut group = c.benchmark_group("drift_statistics");
    group.sample_size(20);

    for rows in [1_000, 10_000] {
        let source = dataset("source", rows, 5, 10);
        let target = dataset("target", rows, 5, 20);
        let temp = TempDir::new().expect("temp dir");
        let options = DriftOptions::new()
            .with_metrics(DriftMetric::all().to_vec())
            .with_source_path(temp.path());

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &rows, |b, _| {
            let engine = LocalEngine::new();
            let binner = AttributeBinner::new();
            b.iter(|| {
                let detector = DriftDetector::new(&engine, &binner, options.clone());
                black_box(detector.statistics(&target, Some(&source), &AttributeSelection::all()))
            });
        });
    }

    group.finish();
}

// ============================================================================
// Stability Benchmarks
// ============================================================================

fn bench_stability_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("stability_scoring");

    for periods in [4, 12, 52] {
        let ledger = ledger(periods, 20);
        let attributes: Vec<String> = ledger.attributes().into_iter().map(String::from).collect();
        let engine = LocalEngine::new();
        let aggregator = StabilityAggregator::new(&engine);

        group.bench_with_input(BenchmarkId::from_parameter(periods), &ledger, |b, ledger| {
            b.iter(|| black_box(aggregator.score_ledger(ledger, &attributes)))
        });
    }

    group.finish();
}

fn bench_feature_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_estimation");

    let ledger = ledger(12, 3);
    let estimator = FeatureStabilityEstimator::new();
    for (name, attributes, formula) in [
        ("identity", "attr_0", "attr_0"),
        ("ratio", "attr_0|attr_1", "attr_0/attr_1"),
        ("nested", "attr_0|attr_1|attr_2", "log(attr_0)*sqrt(attr_1) + attr_2**2"),
    ] {
        let transformation = FeatureTransformation::from_mapping(attributes, formula).expect("valid formula");
        group.bench_function(name, |b| {
            b.iter(|| black_box(estimator.estimate(&ledger, std::slice::from_ref(&transformation))))
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_metrics,
    bench_align,
    bench_drift_statistics,
    bench_stability_scoring,
    bench_feature_estimation,
);

criterion_main!(benches);
