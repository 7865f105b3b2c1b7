//! Configuration validation.
//!
//! Unlike loading, validation never stops at the first problem: it reports
//! every error and warning it can find so `driftwatch config validate` can
//! show them all at once.
//!
//! # Example
//!
//! ```rust,ignore
//! use driftwatch::config::ConfigValidator;
//! use std::path::Path;
//!
//! let report = ConfigValidator::new(Path::new("/path/to/project")).validate();
//! if !report.is_valid() {
//!     eprintln!("{}", report.verbose_report());
//!     std::process::exit(report.exit_code());
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::AnalysisConfig;

/// Exit code for an invalid configuration, shared with
/// [`crate::error::DriftError::exit_code`].
const INVALID_CONFIG_EXIT_CODE: i32 = 7;

/// Result of configuration validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Errors that prevent the configuration from being used.
    pub errors: Vec<String>,
    /// Warnings that don't prevent use but indicate potential issues.
    pub warnings: Vec<String>,
    /// Files that were validated.
    pub files_checked: Vec<PathBuf>,
}

impl ValidationReport {
    /// Create a new empty validation report.
    ///
    /// An empty report is considered valid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if there are no errors. Warnings do not affect validity.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// 0 if valid, the configuration-error exit code otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.is_valid() {
            0
        } else {
            INVALID_CONFIG_EXIT_CODE
        }
    }

    /// One-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match (self.errors.len(), self.warnings.len()) {
            (0, 0) => "configuration is valid".to_string(),
            (0, w) => format!("configuration is valid ({w} warning(s))"),
            (e, w) => format!("configuration is invalid: {e} error(s), {w} warning(s)"),
        }
    }

    /// Multi-line report with problems grouped by config section.
    #[must_use]
    pub fn verbose_report(&self) -> String {
        let mut lines = vec!["Configuration check".to_string(), "\u{2500}".repeat(40)];
        for file in &self.files_checked {
            lines.push(format!("   file: {}", file.display()));
        }

        for (section, problems) in by_section(&self.errors, &self.warnings) {
            lines.push(String::new());
            lines.push(format!("[{section}]"));
            for (is_error, message) in problems {
                let marker = if is_error { "\u{2717}" } else { "\u{26a0}" };
                lines.push(format!("   {marker} {message}"));
            }
        }

        lines.push(String::new());
        lines.push(self.summary());
        lines.join("\n")
    }
}

/// Group messages by their leading `[section]` tag; untagged ones go under
/// `general`. Errors come before warnings within a section.
fn by_section<'a>(
    errors: &'a [String],
    warnings: &'a [String],
) -> BTreeMap<&'a str, Vec<(bool, &'a str)>> {
    let mut sections: BTreeMap<&str, Vec<(bool, &str)>> = BTreeMap::new();
    let tagged = errors
        .iter()
        .map(|m| (true, m.as_str()))
        .chain(warnings.iter().map(|m| (false, m.as_str())));
    for (is_error, message) in tagged {
        let (section, text) = message
            .strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
            .unwrap_or(("general", message));
        sections.entry(section).or_default().push((is_error, text));
    }
    sections
}

/// Validates the configuration file of a project.
#[derive(Debug, Clone)]
pub struct ConfigValidator {
    project_dir: PathBuf,
    config_path: Option<PathBuf>,
}

impl ConfigValidator {
    /// Create a validator for `driftwatch.toml` in `project_dir`.
    #[must_use]
    pub fn new(project_dir: &Path) -> Self {
        Self {
            project_dir: project_dir.to_path_buf(),
            config_path: None,
        }
    }

    /// Validate an explicit file instead of the project default.
    #[must_use]
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Validate the configuration.
    ///
    /// # Validation Steps
    ///
    /// 1. Check the file exists (a missing default file is only a warning)
    /// 2. Parse the TOML against the schema
    /// 3. Validate each section's values
    /// 4. Warn about relative paths that do not exist under the project
    #[must_use]
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        let explicit = self.config_path.is_some();
        let path = self
            .config_path
            .clone()
            .unwrap_or_else(|| AnalysisConfig::config_path(&self.project_dir));

        let config = if path.exists() {
            report.files_checked.push(path.clone());
            match std::fs::read_to_string(&path) {
                Ok(content) => match AnalysisConfig::parse(&content) {
                    Ok(config) => config,
                    Err(e) => {
                        report.errors.push(format!("{}: {e}", path.display()));
                        return report;
                    }
                },
                Err(e) => {
                    report
                        .errors
                        .push(format!("Cannot read {}: {e}", path.display()));
                    return report;
                }
            }
        } else if explicit {
            report
                .errors
                .push(format!("{} not found", path.display()));
            return report;
        } else {
            report.warnings.push(format!(
                "{} not found - using defaults",
                super::CONFIG_FILENAME
            ));
            AnalysisConfig::default()
        };

        config.validate_into(&mut report);

        if config.drift.pre_existing_source {
            let model_root = self
                .project_dir
                .join(&config.drift.source_path)
                .join(&config.drift.model_directory);
            if !model_root.exists() {
                report.warnings.push(format!(
                    "[drift] pre_existing_source is set but {} does not exist",
                    model_root.display()
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_report_is_valid() {
        let report = ValidationReport::new();
        assert!(report.is_valid());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.summary(), "configuration is valid");
    }

    #[test]
    fn test_missing_default_file_warns() {
        let temp = TempDir::new().unwrap();
        let report = ConfigValidator::new(temp.path()).validate();
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.contains("not found")));
    }

    #[test]
    fn test_missing_explicit_file_errors() {
        let temp = TempDir::new().unwrap();
        let report = ConfigValidator::new(temp.path())
            .with_config_path(temp.path().join("custom.toml"))
            .validate();
        assert!(!report.is_valid());
        assert_eq!(report.exit_code(), 7);
    }

    #[test]
    fn test_syntax_error_reported() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("driftwatch.toml"), "[drift\n").unwrap();
        let report = ConfigValidator::new(temp.path()).validate();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.files_checked.len(), 1);
    }

    #[test]
    fn test_pre_existing_source_without_baseline_warns() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("driftwatch.toml"),
            "[drift]\npre_existing_source = true\n",
        )
        .unwrap();
        let report = ConfigValidator::new(temp.path()).validate();
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("pre_existing_source")));
        let verbose = report.verbose_report();
        assert!(verbose.contains("[drift]"));
        assert!(verbose.contains("\u{26a0} pre_existing_source is set"));
    }

    #[test]
    fn test_by_section_groups_tagged_messages() {
        let errors = vec!["[stability] weights must sum to 1".to_string()];
        let warnings = vec![
            "driftwatch.toml not found - using defaults".to_string(),
            "[stability] no ledger_path".to_string(),
        ];
        let sections = by_section(&errors, &warnings);
        assert_eq!(sections.keys().copied().collect::<Vec<_>>(), vec!["general", "stability"]);
        assert_eq!(
            sections["stability"],
            vec![(true, "weights must sum to 1"), (false, "no ledger_path")]
        );
    }
}
