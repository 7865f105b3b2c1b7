//! Attribute stability across chronological snapshots.
//!
//! Each snapshot contributes one period of mean, standard deviation and
//! kurtosis per attribute to a [`MomentLedger`]. The coefficient of
//! variation of each statistic's series is mapped to a 0-4 sub-score and the
//! weighted sub-scores form the stability index.

pub mod aggregator;
pub mod ledger;
pub mod score;
pub mod types;

pub use aggregator::{StabilityAggregator, StabilityOutcome};
pub use ledger::{LedgerStore, MomentLedger, MomentRecord, PeriodMoments};
pub use score::{
    coefficient_of_variation, flag_unstable, score_cv, score_cv_with, weighted_index, CvThresholds,
};
pub use types::{
    MetricWeights, StabilityCategory, StabilityMetric, StabilityReport, StabilityResult,
    DEFAULT_STABILITY_THRESHOLD,
};
