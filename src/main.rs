//! Driftwatch - distribution drift and stability analysis
//!
//! Command-line entry point. Library functionality lives in the
//! `driftwatch` crate; this binary wires configuration, datasets and output.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use driftwatch::binning::BinningMethod;
use driftwatch::report::{log_drift_impact, log_feature_impact, log_stability_impact};
use driftwatch::{
    render, AnalysisConfig, AttributeBinner, AttributeSelection, ConfigValidator, Dataset,
    DriftDetector, DriftError, DriftMetric, ExportFormat, FeatureStabilityEstimator,
    FeatureTransformation, LedgerStore, LocalEngine, MetricWeights, MomentLedger,
    StabilityAggregator, Tabular,
};

#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(version)]
#[command(about = "Distribution drift and attribute stability analysis", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true, default_value = ".")]
    project: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to <project>/driftwatch.toml)
    #[arg(short, long, global = true, env = "DRIFTWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Output flags shared by every analysis.
#[derive(clap::Args)]
struct OutputArgs {
    /// Output format: table, csv, json, or jsonl
    #[arg(short, long)]
    format: Option<ExportFormat>,

    /// Write the result table to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not log the flagged-attribute summary
    #[arg(long)]
    no_impact: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare a target dataset against a baseline
    Drift {
        /// Target dataset (CSV)
        #[arg(short, long)]
        target: PathBuf,

        /// Source (baseline) dataset (CSV); not needed with --pre-existing-source
        #[arg(short, long)]
        source: Option<PathBuf>,

        /// Metrics: PSI, JSD, HD, KS, "all", or a pipe-delimited list
        #[arg(short, long, value_name = "METRICS")]
        method_type: Option<String>,

        /// Binning method: equal_range or equal_frequency
        #[arg(long)]
        bin_method: Option<BinningMethod>,

        /// Number of bins
        #[arg(long)]
        bin_size: Option<usize>,

        /// Flag attributes whose drift exceeds this value
        #[arg(long)]
        threshold: Option<f64>,

        /// Reuse the persisted binning model and source frequencies
        #[arg(long)]
        pre_existing_source: bool,

        /// Directory for baseline artefacts
        #[arg(long)]
        source_path: Option<PathBuf>,

        /// Baseline subdirectory under the source path
        #[arg(long)]
        model_directory: Option<String>,

        /// Attributes to analyse: "all" or a pipe-delimited list
        #[arg(long, value_name = "COLS")]
        cols: Option<String>,

        /// Attributes to exclude (pipe-delimited)
        #[arg(long, value_name = "COLS")]
        drop_cols: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Score attribute stability across chronological snapshots
    Stability {
        /// Period datasets (CSV), oldest first
        #[arg(required = true)]
        periods: Vec<PathBuf>,

        /// Ledger of historical period statistics
        #[arg(short, long)]
        ledger: Option<PathBuf>,

        /// Write the updated ledger here instead of back to --ledger
        #[arg(long, value_name = "PATH", conflicts_with = "no_persist")]
        append_to: Option<PathBuf>,

        /// Do not write the updated ledger back
        #[arg(long)]
        no_persist: bool,

        /// Weights, e.g. "mean=0.5,stddev=0.3,kurtosis=0.2"
        #[arg(short, long)]
        weights: Option<MetricWeights>,

        /// Flag attributes whose index is below this value
        #[arg(long)]
        threshold: Option<f64>,

        /// Attributes to analyse: "all" or a pipe-delimited list
        #[arg(long, value_name = "COLS")]
        cols: Option<String>,

        /// Attributes to exclude (pipe-delimited)
        #[arg(long, value_name = "COLS")]
        drop_cols: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Estimate stability of derived features from a ledger
    FeatureStability {
        /// Ledger of period statistics
        #[arg(short, long)]
        ledger: Option<PathBuf>,

        /// Feature as ATTRIBUTES=FORMULA, e.g. "x|y=x/y" (repeatable)
        #[arg(short = 'F', long = "feature", value_name = "ATTRS=FORMULA")]
        features: Vec<String>,

        /// Weights, e.g. "mean=0.5,stddev=0.3,kurtosis=0.2"
        #[arg(short, long)]
        weights: Option<MetricWeights>,

        /// Flag features whose bound is below this value
        #[arg(long)]
        threshold: Option<f64>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file
    Validate,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing; RUST_LOG overrides the default filter
    let filter = if cli.verbose {
        "driftwatch=debug,info"
    } else {
        "driftwatch=info,warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        let code = e.downcast_ref::<DriftError>().map_or(1, DriftError::exit_code);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let project = cli.project.canonicalize().unwrap_or(cli.project.clone());
    if !project.exists() {
        anyhow::bail!("Project directory does not exist: {}", project.display());
    }

    // validate reports problems itself instead of failing on load
    if matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Validate
        }
    ) {
        return validate_config(&project, cli.config.as_deref(), cli.verbose);
    }

    let config = match &cli.config {
        Some(path) => AnalysisConfig::load_from(path)?,
        None => AnalysisConfig::load(&project)?,
    };
    debug!(project = %project.display(), "Loaded configuration");

    match cli.command {
        Commands::Drift {
            target,
            source,
            method_type,
            bin_method,
            bin_size,
            threshold,
            pre_existing_source,
            source_path,
            model_directory,
            cols,
            drop_cols,
            output,
        } => {
            let drift = &config.drift;
            let mut options = drift.options()?;
            if let Some(selection) = method_type {
                options = options.with_metrics(DriftMetric::parse_list(&selection)?);
            }
            options = options.with_binning(
                bin_method.unwrap_or(drift.bin_method),
                bin_size.unwrap_or(drift.bin_size),
            );
            if let Some(threshold) = threshold {
                options = options.with_threshold(threshold);
            }
            if pre_existing_source {
                options = options.with_pre_existing_source(true);
            }
            let source_path = source_path.unwrap_or_else(|| resolve(&project, &drift.source_path));
            options = options.with_source_path(source_path);
            if let Some(name) = model_directory {
                options = options.with_model_directory(name);
            }
            let selection = AttributeSelection::parse(
                cols.as_deref().unwrap_or(&drift.list_of_cols),
                drop_cols.as_deref().unwrap_or(&drift.drop_cols),
            );

            let target = Dataset::from_csv_path(&target)?;
            let source = match (&source, options.pre_existing_source) {
                (Some(path), false) => Some(Dataset::from_csv_path(path)?),
                (Some(_), true) => {
                    debug!("Ignoring --source because a pre-existing baseline is used");
                    None
                }
                (None, _) => None,
            };

            let engine = LocalEngine::new();
            let binner = AttributeBinner::new();
            let report = DriftDetector::new(&engine, &binner, options)
                .statistics(&target, source.as_ref(), &selection)?;

            emit(&report, &output, &config)?;
            if impact_enabled(&output, &config) {
                log_drift_impact(&report);
            }
        }

        Commands::Stability {
            periods,
            ledger,
            append_to,
            no_persist,
            weights,
            threshold,
            cols,
            drop_cols,
            output,
        } => {
            let stability = &config.stability;
            let datasets = periods
                .iter()
                .map(|p| Dataset::from_csv_path(p))
                .collect::<driftwatch::Result<Vec<_>>>()?;
            let selection = AttributeSelection::parse(
                cols.as_deref().unwrap_or(&stability.list_of_cols),
                drop_cols.as_deref().unwrap_or(&stability.drop_cols),
            );

            let ledger_path = ledger.or_else(|| {
                stability
                    .ledger_path
                    .as_deref()
                    .map(|p| resolve(&project, p))
            });
            let prior = match &ledger_path {
                Some(path) => LedgerStore::new(path).load_or_default()?,
                None => MomentLedger::new(),
            };
            debug!(rows = prior.len(), periods = prior.max_period(), "Loaded prior ledger");

            let engine = LocalEngine::new();
            let mut aggregator = StabilityAggregator::new(&engine)
                .with_weights(weights.unwrap_or(stability.weights))
                .with_threshold(threshold.unwrap_or(stability.threshold))
                .with_cv_thresholds(stability.cv_cutoffs());
            // an explicit --append-to always writes; the read path only when persisting
            let write_path = append_to.or_else(|| {
                ledger_path.filter(|_| stability.persist_ledger && !no_persist)
            });
            if let Some(path) = write_path {
                aggregator = aggregator.with_ledger_store(LedgerStore::new(path));
            }

            let outcome = aggregator.run(&datasets, &selection, &prior)?;
            emit(&outcome.report, &output, &config)?;
            if impact_enabled(&output, &config) {
                log_stability_impact(&outcome.report);
            }
        }

        Commands::FeatureStability {
            ledger,
            features,
            weights,
            threshold,
            output,
        } => {
            let ledger_path = ledger
                .or_else(|| config.feature_ledger_path().map(|p| resolve(&project, p)))
                .ok_or_else(|| {
                    DriftError::config("no ledger given; pass --ledger or set stability.ledger_path")
                })?;
            let ledger = LedgerStore::new(&ledger_path).load()?;

            let transformations = if features.is_empty() {
                config.transformations()?
            } else {
                features
                    .iter()
                    .map(|f| parse_feature(f))
                    .collect::<driftwatch::Result<Vec<_>>>()?
            };
            if transformations.is_empty() {
                return Err(DriftError::config(
                    "no derived features given; pass --feature or set [[feature.transformations]]",
                )
                .into());
            }

            let estimator = FeatureStabilityEstimator::new()
                .with_weights(weights.unwrap_or(config.stability.weights))
                .with_threshold(threshold.unwrap_or_else(|| config.feature_threshold()))
                .with_cv_thresholds(config.stability.cv_cutoffs());
            let report = estimator.estimate(&ledger, &transformations)?;

            emit(&report, &output, &config)?;
            if impact_enabled(&output, &config) {
                log_feature_impact(&report);
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    println!("{}", config.to_toml()?);
                }
            }

            ConfigAction::Validate => {
                validate_config(&project, cli.config.as_deref(), cli.verbose)?;
            }
        },
    }

    Ok(())
}

fn validate_config(project: &Path, config: Option<&Path>, verbose: bool) -> anyhow::Result<()> {
    let mut validator = ConfigValidator::new(project);
    if let Some(path) = config {
        validator = validator.with_config_path(path.to_path_buf());
    }
    let report = validator.validate();

    if verbose {
        println!("{}", report.verbose_report());
    } else {
        for error in &report.errors {
            eprintln!("{} {}", "Error:".red(), error);
        }
        for warning in &report.warnings {
            eprintln!("{} {}", "Warning:".yellow(), warning);
        }
    }

    if !report.is_valid() {
        std::process::exit(report.exit_code());
    }
    println!("{} {}", "OK".green().bold(), report.summary());
    Ok(())
}

/// Config paths are relative to the project directory.
fn resolve(project: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project.join(path)
    }
}

/// Parse `ATTRS=FORMULA`.
fn parse_feature(arg: &str) -> driftwatch::Result<FeatureTransformation> {
    let (attributes, formula) = arg.split_once('=').ok_or_else(|| {
        DriftError::invalid_config("feature", format!("expected ATTRS=FORMULA, got '{arg}'"))
    })?;
    FeatureTransformation::from_mapping(attributes, formula)
}

fn impact_enabled(output: &OutputArgs, config: &AnalysisConfig) -> bool {
    config.output.print_impact && !output.no_impact
}

/// Render and write a result table to the requested destination.
fn emit<T: Tabular>(table: &T, output: &OutputArgs, config: &AnalysisConfig) -> anyhow::Result<()> {
    let format = output.format.unwrap_or(config.output.format);
    let mut rendered = render(table, format)?;
    if !rendered.ends_with('\n') {
        rendered.push('\n');
    }

    match output.output.as_ref().or(config.output.path.as_ref()) {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(path, rendered).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), %format, "Wrote results");
            println!("{} Results written to {}", "OK".green().bold(), path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
