//! Analysis configuration.
//!
//! Settings are read from `driftwatch.toml` in the project directory. Every
//! field has a default, so a missing file or a partial file is fine. CLI
//! flags override file values through the `with_*` builders on the option
//! types produced here.
//!
//! ```toml
//! [drift]
//! method_type = "PSI|KS"
//! bin_method = "equal_frequency"
//! bin_size = 10
//! threshold = 0.1
//!
//! [stability]
//! threshold = 1.0
//! ledger_path = "stats/ledger.csv"
//!
//! [stability.weights]
//! mean = 0.5
//! stddev = 0.3
//! kurtosis = 0.2
//!
//! [[feature.transformations]]
//! attributes = "income|age"
//! formula = "income/age"
//!
//! [output]
//! format = "csv"
//! ```

pub mod validation;

pub use validation::{ConfigValidator, ValidationReport};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binning::BinningMethod;
use crate::dataset::AttributeSelection;
use crate::drift::{DriftOptions, DEFAULT_MODEL_DIRECTORY, DEFAULT_SOURCE_PATH};
use crate::error::{DriftError, IntoDriftError, Result};
use crate::feature::FeatureTransformation;
use crate::metrics::DriftMetric;
use crate::report::ExportFormat;
use crate::stability::{CvThresholds, MetricWeights, DEFAULT_STABILITY_THRESHOLD};

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = "driftwatch.toml";

/// Drift detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Metric selection: a name, `all`, or a pipe-delimited list.
    #[serde(default = "default_method_type")]
    pub method_type: String,

    /// Binning strategy.
    #[serde(default)]
    pub bin_method: BinningMethod,

    /// Number of bins (default: 10).
    #[serde(default = "default_bin_size")]
    pub bin_size: usize,

    /// Flag threshold (default: 0.1).
    #[serde(default = "default_drift_threshold")]
    pub threshold: f64,

    /// Reuse a persisted baseline.
    #[serde(default)]
    pub pre_existing_source: bool,

    /// Directory for baseline artefacts.
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,

    /// Subdirectory of `source_path` for this baseline.
    #[serde(default = "default_model_directory")]
    pub model_directory: String,

    /// Attributes to analyse (`all` or pipe-delimited).
    #[serde(default = "default_list_of_cols")]
    pub list_of_cols: String,

    /// Attributes to exclude (pipe-delimited).
    #[serde(default)]
    pub drop_cols: String,
}

fn default_method_type() -> String {
    "PSI".to_string()
}

fn default_bin_size() -> usize {
    10
}

fn default_drift_threshold() -> f64 {
    0.1
}

fn default_source_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOURCE_PATH)
}

fn default_model_directory() -> String {
    DEFAULT_MODEL_DIRECTORY.to_string()
}

fn default_list_of_cols() -> String {
    "all".to_string()
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            method_type: default_method_type(),
            bin_method: BinningMethod::default(),
            bin_size: default_bin_size(),
            threshold: default_drift_threshold(),
            pre_existing_source: false,
            source_path: default_source_path(),
            model_directory: default_model_directory(),
            list_of_cols: default_list_of_cols(),
            drop_cols: String::new(),
        }
    }
}

impl DriftConfig {
    /// Build run options from this section.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the metric selection is invalid.
    pub fn options(&self) -> Result<DriftOptions> {
        Ok(DriftOptions::new()
            .with_metrics(DriftMetric::parse_list(&self.method_type)?)
            .with_binning(self.bin_method, self.bin_size)
            .with_threshold(self.threshold)
            .with_pre_existing_source(self.pre_existing_source)
            .with_source_path(&self.source_path)
            .with_model_directory(&self.model_directory))
    }

    /// Attribute selection from `list_of_cols` and `drop_cols`.
    #[must_use]
    pub fn selection(&self) -> AttributeSelection {
        AttributeSelection::parse(&self.list_of_cols, &self.drop_cols)
    }
}

/// Attribute stability settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityConfig {
    /// Flag threshold (default: 1.0).
    #[serde(default = "default_stability_threshold")]
    pub threshold: f64,

    /// Ascending CV cutoffs.
    #[serde(default = "default_cv_thresholds")]
    pub cv_thresholds: Vec<f64>,

    /// Ledger file holding historical period statistics.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,

    /// Write the combined ledger back to `ledger_path` (default: true).
    #[serde(default = "default_true")]
    pub persist_ledger: bool,

    /// Attributes to analyse (`all` or pipe-delimited).
    #[serde(default = "default_list_of_cols")]
    pub list_of_cols: String,

    /// Attributes to exclude (pipe-delimited).
    #[serde(default)]
    pub drop_cols: String,

    /// Sub-score weights.
    #[serde(default)]
    pub weights: MetricWeights,
}

fn default_stability_threshold() -> f64 {
    DEFAULT_STABILITY_THRESHOLD
}

fn default_cv_thresholds() -> Vec<f64> {
    CvThresholds::default().cutoffs().to_vec()
}

fn default_true() -> bool {
    true
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            threshold: default_stability_threshold(),
            cv_thresholds: default_cv_thresholds(),
            ledger_path: None,
            persist_ledger: true,
            list_of_cols: default_list_of_cols(),
            drop_cols: String::new(),
            weights: MetricWeights::default(),
        }
    }
}

impl StabilityConfig {
    /// Attribute selection from `list_of_cols` and `drop_cols`.
    #[must_use]
    pub fn selection(&self) -> AttributeSelection {
        AttributeSelection::parse(&self.list_of_cols, &self.drop_cols)
    }

    /// CV cutoffs as a scorer parameter.
    #[must_use]
    pub fn cv_cutoffs(&self) -> CvThresholds {
        CvThresholds::new(self.cv_thresholds.clone())
    }
}

/// One derived feature definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationEntry {
    /// Pipe-delimited attribute set, e.g. `"x|y"`.
    pub attributes: String,
    /// Formula over those attributes.
    pub formula: String,
}

/// Derived feature stability settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Ledger to read; falls back to `stability.ledger_path`.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,

    /// Flag threshold; falls back to `stability.threshold`.
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Feature definitions.
    #[serde(default)]
    pub transformations: Vec<TransformationEntry>,
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Format of result tables.
    #[serde(default)]
    pub format: ExportFormat,

    /// Log a summary of flagged attributes after each run (default: true).
    #[serde(default = "default_true")]
    pub print_impact: bool,

    /// Write the table to this file instead of stdout.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            print_impact: true,
            path: None,
        }
    }
}

/// Full analysis configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub feature: FeatureConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl AnalysisConfig {
    /// Path of the configuration file in a project directory.
    #[must_use]
    pub fn config_path(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILENAME)
    }

    /// Load `driftwatch.toml` from a project directory, or defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = Self::config_path(project_dir);
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load an explicit configuration file.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the file does not exist, or a TOML
    /// error if it does not parse.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DriftError::config_with_path(
                "configuration file not found",
                path.to_path_buf(),
            ));
        }
        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns a TOML error if the text is not valid or does not match the
    /// schema.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).into_drift_config()
    }

    /// Parsed feature definitions.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for the first invalid definition.
    pub fn transformations(&self) -> Result<Vec<FeatureTransformation>> {
        self.feature
            .transformations
            .iter()
            .map(|t| FeatureTransformation::from_mapping(&t.attributes, &t.formula))
            .collect()
    }

    /// Ledger used by feature stability.
    #[must_use]
    pub fn feature_ledger_path(&self) -> Option<&Path> {
        self.feature
            .ledger_path
            .as_deref()
            .or(self.stability.ledger_path.as_deref())
    }

    /// Threshold used by feature stability.
    #[must_use]
    pub fn feature_threshold(&self) -> f64 {
        self.feature.threshold.unwrap_or(self.stability.threshold)
    }

    /// Validate every section, collecting all problems.
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        self.validate_into(&mut report);
        report
    }

    pub(crate) fn validate_into(&self, report: &mut ValidationReport) {
        if let Err(e) = self.drift.options().and_then(|o| o.validate()) {
            report.errors.push(format!("[drift] {e}"));
        }
        if self.drift.bin_size > 100 {
            report.warnings.push(format!(
                "[drift] bin_size {} is large; sparse bins inflate PSI and JSD",
                self.drift.bin_size
            ));
        }
        if self.drift.threshold <= 0.0 {
            report
                .warnings
                .push("[drift] threshold <= 0 flags every attribute".to_string());
        }

        if let Err(e) = self.stability.weights.validate() {
            report.errors.push(format!("[stability] {e}"));
        }
        if !self.stability.threshold.is_finite() {
            report
                .errors
                .push("[stability] threshold must be finite".to_string());
        }
        if self.stability.cv_thresholds.is_empty()
            || self
                .stability
                .cv_thresholds
                .iter()
                .any(|c| !c.is_finite() || *c < 0.0)
        {
            report.errors.push(
                "[stability] cv_thresholds must be a non-empty list of non-negative numbers"
                    .to_string(),
            );
        }
        if self.stability.ledger_path.is_none() {
            report.warnings.push(
                "[stability] no ledger_path: period statistics will not be kept between runs"
                    .to_string(),
            );
        }

        for (i, entry) in self.feature.transformations.iter().enumerate() {
            if let Err(e) = FeatureTransformation::from_mapping(&entry.attributes, &entry.formula) {
                report
                    .errors
                    .push(format!("[feature] transformations[{i}]: {e}"));
            }
        }
        if let Some(threshold) = self.feature.threshold {
            if !threshold.is_finite() {
                report
                    .errors
                    .push("[feature] threshold must be finite".to_string());
            }
        }
        if !self.feature.transformations.is_empty() && self.feature_ledger_path().is_none() {
            report.warnings.push(
                "[feature] transformations defined but no ledger_path is configured".to_string(),
            );
        }
    }
}
