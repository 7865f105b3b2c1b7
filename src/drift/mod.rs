//! Distribution drift between a baseline (source) and a target dataset.
//!
//! Both datasets are discretized with the same binning model, turned into
//! per-bin probability tables, aligned on a shared bin ordering and compared
//! with the metrics in [`crate::metrics`]. The baseline's binning model and
//! frequency tables are persisted so subsequent runs can skip the source.

mod detector;
pub mod frequency;
mod types;

pub use detector::DriftDetector;
pub use frequency::{align, AlignedDistributions, FrequencyStore, FrequencyTable, PROBABILITY_FLOOR};
pub use types::{
    any_exceeds, DriftOptions, DriftReport, DriftResult, MetricScore, DEFAULT_MODEL_DIRECTORY,
    DEFAULT_SOURCE_PATH,
};
