//! End-to-end library pipeline: period snapshots to ledger to derived features

use driftwatch::{
    AttributeSelection, Dataset, FeatureStabilityEstimator, FeatureTransformation, LedgerStore,
    LocalEngine, MomentLedger, StabilityAggregator,
};
use tempfile::TempDir;

fn periods() -> Vec<Dataset> {
    vec![
        Dataset::new("p1")
            .with_values("x", &[1.0, 2.0, 3.0, 4.0])
            .with_values("y", &[10.0, 12.0, 11.0, 13.0]),
        Dataset::new("p2")
            .with_values("x", &[1.5, 2.0, 3.5, 4.0])
            .with_values("y", &[10.0, 14.0, 11.0, 12.0]),
        Dataset::new("p3")
            .with_values("x", &[2.0, 2.5, 3.0, 5.0])
            .with_values("y", &[9.0, 12.0, 11.0, 13.0]),
    ]
}

#[test]
fn test_identity_feature_matches_attribute_stability() {
    let engine = LocalEngine::new();
    let outcome = StabilityAggregator::new(&engine)
        .run(&periods(), &AttributeSelection::all(), &MomentLedger::new())
        .unwrap();

    let identity = FeatureTransformation::from_mapping("x", "x").unwrap();
    let features = FeatureStabilityEstimator::new()
        .estimate(&outcome.ledger, &[identity])
        .unwrap();

    let attribute = outcome.report.get("x").unwrap();
    let feature = &features.rows[0];
    assert_eq!(feature.mean_cv, attribute.mean_cv);
    assert_eq!(feature.stddev_cv, attribute.stddev_cv);
    assert_eq!(feature.mean_si, attribute.mean_si);
    assert_eq!(feature.stddev_si, attribute.stddev_si);

    // the bounds bracket the attribute's own index
    let index = attribute.stability_index.unwrap();
    let lower = feature.stability_index_lower_bound.unwrap();
    let upper = feature.stability_index_upper_bound.unwrap();
    assert!(lower <= index + 1e-9 && index <= upper + 1e-9);
}

#[test]
fn test_ledger_persists_between_runs() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ledger.csv");
    let engine = LocalEngine::new();
    let all = periods();

    let first = StabilityAggregator::new(&engine)
        .with_ledger_store(LedgerStore::new(&path))
        .run(&all[..2], &AttributeSelection::all(), &MomentLedger::new())
        .unwrap();
    assert_eq!(first.ledger.max_period(), 2);

    let prior = LedgerStore::new(&path).load().unwrap();
    assert_eq!(prior, first.ledger);

    let second = StabilityAggregator::new(&engine)
        .with_ledger_store(LedgerStore::new(&path))
        .run(&all[2..], &AttributeSelection::all(), &prior)
        .unwrap();
    assert_eq!(second.ledger.max_period(), 3);

    // one run over all periods scores the same as two incremental runs
    let single = StabilityAggregator::new(&engine)
        .run(&all, &AttributeSelection::all(), &MomentLedger::new())
        .unwrap();
    assert_eq!(single.report, second.report);
}

#[test]
fn test_ratio_feature_over_persisted_ledger() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ledger.csv");
    let engine = LocalEngine::new();
    StabilityAggregator::new(&engine)
        .with_ledger_store(LedgerStore::new(&path))
        .run(&periods(), &AttributeSelection::all(), &MomentLedger::new())
        .unwrap();

    let ledger = LedgerStore::new(&path).load().unwrap();
    let ratio = FeatureTransformation::from_mapping("x|y", "x/y").unwrap();
    let report = FeatureStabilityEstimator::new()
        .estimate(&ledger, &[ratio])
        .unwrap();

    let row = &report.rows[0];
    assert_eq!(row.feature_formula, "x/y");
    assert!(row.mean_cv.is_some());
    assert!(row.stability_index_lower_bound <= row.stability_index_upper_bound);
}
