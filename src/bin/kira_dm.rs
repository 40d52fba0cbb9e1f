use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_data_miner::annotation::SampleAnnotationInferencer;
use kira_data_miner::app::{DataMiner, RunOptions};
use kira_data_miner::config::{ConfigLoader, ConfigOverrides, Environment};
use kira_data_miner::domain::{Registry, SearchRequest};
use kira_data_miner::error::KiraError;
use kira_data_miner::ncbi::EntrezClient;
use kira_data_miner::output::{ConsoleProgress, JsonOutput, OutputMode, print_run_summary};
use kira_data_miner::quality::{QualityAssessor, ScoringRules};
use kira_data_miner::query::QueryBuilder;
use kira_data_miner::registry::ncbi_sources;
use kira_data_miner::store::FsStore;

#[derive(Parser)]
#[command(name = "kira-dm")]
#[command(about = "PRISMA 2020 compliant metadata mining across NCBI registries")]
#[command(version, author)]
struct Cli {
    /// Organism, e.g. "Arabidopsis thaliana"
    #[arg(long)]
    organism: String,

    /// Condition or treatment, e.g. "salt stress" or "salt_stress"
    #[arg(long)]
    condition: String,

    /// Experiment type, e.g. "RNA-seq"
    #[arg(long)]
    experiment: String,

    /// Short name used in output file names
    #[arg(long)]
    label: String,

    #[arg(long, default_value = ".")]
    output_dir: Utf8PathBuf,

    /// Minimum quality score (0-100) for inclusion [default: 60]
    #[arg(long)]
    min_quality: Option<f64>,

    /// Include every screened record regardless of score
    #[arg(long)]
    no_quality_filter: bool,

    #[arg(long)]
    email: Option<String>,

    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// JSON config file [default: kira-dm.json when present]
    #[arg(long)]
    config: Option<String>,

    /// Registries to search; repeat to select several [default: all]
    #[arg(long = "registry", value_enum)]
    registries: Vec<Registry>,

    /// Print the run result as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    if error.is_configuration() { 2 } else { 1 }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let overrides = ConfigOverrides {
        email: cli.email,
        api_key: cli.api_key,
        batch_size: cli.batch_size,
        registries: cli.registries,
        min_quality: cli.min_quality,
    };
    let config = ConfigLoader::resolve(
        cli.config.as_deref(),
        &overrides,
        &Environment::from_process(),
    )?;
    tracing::debug!(?config, "resolved configuration");

    let request = SearchRequest::new(cli.organism, cli.condition, cli.experiment, cli.label)?;
    let assessor = QualityAssessor::new(config.weights, ScoringRules::default())?;
    let client = Arc::new(EntrezClient::new(config.entrez_settings())?);
    let miner = DataMiner::new(
        ncbi_sources(client, &config.registries),
        assessor,
        SampleAnnotationInferencer::new(),
        QueryBuilder::new(),
        FsStore::new(cli.output_dir),
    );
    let options = RunOptions {
        quality_filter: !cli.no_quality_filter,
        min_quality: config.min_quality,
    };

    match output_mode {
        OutputMode::Json => {
            let result = miner.run(request, options, &JsonOutput)?;
            JsonOutput::print_run(&result).into_diagnostic()?;
        }
        OutputMode::Human => {
            let result = miner.run(request, options, &ConsoleProgress)?;
            print_run_summary(&result);
        }
    }
    Ok(())
}
