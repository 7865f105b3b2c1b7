//! Driftwatch - distribution drift and stability analysis
//!
//! Detects distribution drift between a baseline and a target dataset, and
//! scores how stable attributes (and features derived from them) remain
//! across a sequence of snapshots.
//!
//! # Architecture
//!
//! - [`metrics`] - PSI, Jensen-Shannon, Hellinger and Kolmogorov-Smirnov distances
//! - [`drift`] - Per-attribute drift between a source and a target dataset
//! - [`stability`] - Moment ledger, CV scoring and the stability index
//! - [`feature`] - Stability range of derived features via moment propagation
//! - [`expr`] - Formula parsing and symbolic differentiation
//! - [`dataset`] / [`engine`] / [`binning`] - Data access and aggregation
//! - [`config`] - TOML configuration loading and validation
//! - [`report`] - Table rendering (text, CSV, JSON, JSON Lines)
//! - [`error`] - Error types and exit codes
//!
//! # Example
//!
//! ```rust,ignore
//! use driftwatch::{AttributeBinner, AttributeSelection, Dataset, DriftDetector, DriftOptions, LocalEngine};
//!
//! let source = Dataset::from_csv_path("baseline.csv".as_ref())?;
//! let target = Dataset::from_csv_path("today.csv".as_ref())?;
//!
//! let engine = LocalEngine::new();
//! let binner = AttributeBinner::new();
//! let detector = DriftDetector::new(&engine, &binner, DriftOptions::default());
//! let report = detector.statistics(&target, Some(&source), &AttributeSelection::all())?;
//!
//! for row in report.flagged() {
//!     println!("{} drifted", row.attribute);
//! }
//! ```

pub mod binning;
pub mod config;
pub mod dataset;
pub mod drift;
pub mod engine;
pub mod error;
pub mod expr;
pub mod feature;
pub mod metrics;
pub mod report;
pub mod stability;

// Re-export commonly used types
pub use error::{DriftError, IntoDriftError, Result};

pub use binning::{AttributeBinner, Binner, BinningMethod, BinningModel, ModelStore};
pub use config::{AnalysisConfig, ConfigValidator, ValidationReport};
pub use dataset::{AttributeSelection, Column, Dataset};
pub use drift::{DriftDetector, DriftOptions, DriftReport, DriftResult};
pub use engine::{AggregationEngine, ColumnMoments, LocalEngine};
pub use feature::{
    estimate_moments, FeatureMomentEstimate, FeatureStabilityEstimator, FeatureStabilityReport,
    FeatureStabilityResult, FeatureTransformation,
};
pub use metrics::DriftMetric;
pub use report::{render, ExportFormat, Tabular};
pub use stability::{
    LedgerStore, MetricWeights, MomentLedger, MomentRecord, StabilityAggregator,
    StabilityCategory, StabilityReport, StabilityResult,
};
