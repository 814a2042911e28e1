//! famsel - per-feature distributional model selection CLI.

use clap::{Parser, Subcommand};
use famsel::correct::CorrectionMethod;
use famsel::data::{DesignMatrix, ExpressionMatrix, Formula, Metadata};
use famsel::error::Result;
use famsel::family::FamilySpec;
use famsel::fit::{Retention, SelectionCriterion};
use famsel::run::{run_selection, RunConfig, StderrReporter};
use std::path::PathBuf;
use std::time::Duration;

/// Per-feature distributional model selection
#[derive(Parser)]
#[command(name = "famsel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit, select and test every feature of an expression matrix
    Run {
        /// Path to expression matrix TSV (features × samples)
        #[arg(short = 'x', long)]
        matrix: PathBuf,

        /// Path to sample metadata TSV
        #[arg(short, long)]
        metadata: PathBuf,

        /// Formula for the linear predictor (e.g., "~ group")
        #[arg(short, long)]
        formula: String,

        /// Coefficient to test (e.g., "grouptreatment")
        #[arg(short = 't', long)]
        test_coef: String,

        /// Output path for results TSV
        #[arg(short, long)]
        output: PathBuf,

        /// Optional path to a RunConfig YAML; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated ordered family list
        #[arg(long, value_delimiter = ',')]
        families: Option<Vec<FamilySpec>>,

        /// Selection criterion: aic, bic, gaic or loglik
        #[arg(long)]
        criterion: Option<SelectionCriterion>,

        /// Penalty for the generalized AIC
        #[arg(long)]
        gaic_penalty: Option<f64>,

        /// Per-fit time budget in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Correction method: bh, holm or bonferroni
        #[arg(long)]
        correction: Option<CorrectionMethod>,

        /// Worker pool size (default: available parallelism)
        #[arg(long)]
        threads: Option<usize>,

        /// Retain the full fitted model per feature instead of the
        /// distilled summary
        #[arg(long)]
        keep_models: bool,

        /// Skip the upfront coefficient check and let features degrade to
        /// untestable
        #[arg(long)]
        allow_partial_contrast: bool,

        /// Also write results as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Progress line every N features (0 = quiet)
        #[arg(long, default_value = "500")]
        progress: usize,
    },

    /// Print a default run configuration as YAML
    Config,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            matrix,
            metadata,
            formula,
            test_coef,
            output,
            config,
            families,
            criterion,
            gaic_penalty,
            timeout_ms,
            correction,
            threads,
            keep_models,
            allow_partial_contrast,
            json,
            progress,
        } => {
            let mut run_config = match config {
                Some(path) => RunConfig::from_yaml(&std::fs::read_to_string(path)?)?,
                None => RunConfig::default(),
            };
            if let Some(families) = families {
                run_config.families = families;
            }
            if let Some(criterion) = criterion {
                run_config.criterion = criterion;
            }
            if let Some(penalty) = gaic_penalty {
                run_config = run_config.gaic_penalty(penalty);
            }
            if let Some(ms) = timeout_ms {
                run_config = run_config.fit_timeout(Duration::from_millis(ms));
            }
            if let Some(correction) = correction {
                run_config.correction = correction;
            }
            if let Some(threads) = threads {
                run_config = run_config.threads(threads);
            }
            if keep_models {
                run_config.retention = Retention::FullModel;
            }
            if allow_partial_contrast {
                run_config.check_coefficient = false;
            }
            run_config.progress_every = progress;

            eprintln!("Loading data...");
            let matrix = ExpressionMatrix::from_tsv(&matrix)?;
            let metadata = Metadata::from_tsv(&metadata)?;
            let metadata = metadata.align_to(matrix.sample_ids())?;
            eprintln!(
                "  {} features × {} samples",
                matrix.n_features(),
                matrix.n_samples()
            );

            let formula = Formula::parse(&formula)?;
            let design = DesignMatrix::from_formula(&metadata, &formula)?;
            eprintln!(
                "Fitting {} features (families: {}, criterion: {})...",
                matrix.n_features(),
                run_config
                    .families
                    .iter()
                    .map(|f| f.name())
                    .collect::<Vec<_>>()
                    .join(", "),
                run_config.criterion
            );

            let reporter = StderrReporter::new(run_config.progress_every);
            let results = run_selection(&matrix, &design, &test_coef, &run_config, &reporter)?;

            eprintln!("Writing results to {:?}...", output);
            results.to_tsv(&output)?;
            if let Some(json_path) = json {
                std::fs::write(&json_path, serde_json::to_string_pretty(&results)?)?;
            }

            let n_sig = results.n_significant(0.05);
            eprintln!("Done! {} features analyzed", results.len());
            eprintln!("  {} significant at adjusted p < 0.05", n_sig);
            Ok(())
        }
        Commands::Config => {
            println!("{}", RunConfig::default().to_yaml()?);
            Ok(())
        }
    }
}
