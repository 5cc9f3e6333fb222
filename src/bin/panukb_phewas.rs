use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing::info;
use tracing_subscriber::EnvFilter;

use panukb_phewas::catalog::PhenotypeCatalog;
use panukb_phewas::config::{RunConfig, SettingsLoader};
use panukb_phewas::error::PhewasError;
use panukb_phewas::extract::RemoteTabixSource;
use panukb_phewas::output::{HumanOutput, JsonOutput, LogSink, OutputMode};
use panukb_phewas::pipeline::Pipeline;
use panukb_phewas::remote::HttpClient;
use panukb_phewas::tabix::SystemTabix;

#[derive(Parser)]
#[command(name = "panukb-phewas")]
#[command(about = "Perform a PheWAS across all Pan-UKB phenotypes at one locus")]
#[command(version)]
struct Cli {
    #[arg(long, help = "chr:start-end of target variant")]
    loc: String,

    #[arg(long, help = "Name of locus")]
    name: String,

    #[arg(long, default_value_t = 50000, allow_negative_numbers = true, help = "Window size (bp)")]
    window: i64,

    #[arg(long, default_value = "panukb-manifest.csv", help = "Path to manifest file")]
    manifest: PathBuf,

    #[arg(
        long,
        default_value_t = -1,
        allow_negative_numbers = true,
        help = "Number of phenotypes to process (for debugging)"
    )]
    numpts: i64,

    #[arg(long, help = "Output directory to store results")]
    outdir: Utf8PathBuf,

    #[arg(long, help = "JSON settings file (default: ./panukb-phewas.json if present)")]
    config: Option<String>,

    #[arg(long, help = "Phenotypes fetched concurrently")]
    concurrency: Option<usize>,

    #[arg(long, help = "Per-phenotype range query timeout (seconds)")]
    fetch_timeout: Option<u64>,

    #[arg(long, help = "Print the run report as JSON on stdout")]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PhewasError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PhewasError) -> u8 {
    match error {
        PhewasError::MalformedLocus(_)
        | PhewasError::InvalidWindow(_)
        | PhewasError::InvalidName(_)
        | PhewasError::ManifestRead(_)
        | PhewasError::ManifestParse(_)
        | PhewasError::DuplicatePhenocode(_)
        | PhewasError::EmptyCatalog
        | PhewasError::ConfigRead(_)
        | PhewasError::ConfigParse(_)
        | PhewasError::IndexDir(..) => 2,
        PhewasError::FetchHttp(_)
        | PhewasError::FetchStatus { .. }
        | PhewasError::FetchTimeout(_)
        | PhewasError::RangeQuery(_)
        | PhewasError::MissingTool(_) => 3,
        PhewasError::ZeroSuccesses { .. } => 4,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let mut settings = SettingsLoader::resolve(cli.config.as_deref())?;
    if let Some(concurrency) = cli.concurrency {
        settings.concurrency = concurrency;
    }
    if let Some(timeout) = cli.fetch_timeout {
        settings.fetch_timeout_secs = timeout;
    }

    let config = RunConfig::new(
        &cli.loc,
        &cli.name,
        cli.window,
        cli.numpts,
        cli.outdir,
        settings,
    )?;
    info!("Processing locus {} ({})", config.locus, config.name);

    let catalog = PhenotypeCatalog::from_path(&cli.manifest)?;

    let tabix = SystemTabix::new(&config.settings);
    tabix.program()?;
    tabix.prepare_index_dir()?;
    if let Some(version) = tabix.version() {
        info!(tabix = %version, "using tabix");
    }
    let http = HttpClient::new(&config.settings)?;
    let pipeline = Pipeline::new(RemoteTabixSource::new(http, tabix));

    let report = pipeline.run(&config, &catalog, &LogSink)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_run(&report).into_diagnostic()?,
        OutputMode::Human => HumanOutput::write_run(std::io::stderr(), &report).into_diagnostic()?,
    }
    Ok(())
}
