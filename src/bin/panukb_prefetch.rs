use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use panukb_phewas::catalog::PhenotypeCatalog;
use panukb_phewas::config::SettingsLoader;
use panukb_phewas::error::PhewasError;
use panukb_phewas::output::{HumanOutput, JsonOutput, LogSink};
use panukb_phewas::prefetch::{PrefetchOptions, prefetch_indexes};
use panukb_phewas::remote::HttpClient;

#[derive(Parser)]
#[command(name = "panukb-prefetch")]
#[command(about = "Download the tabix index of every Pan-UKB phenotype in a manifest")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "panukb-manifest.csv", help = "Path to manifest file")]
    manifest: PathBuf,

    #[arg(long, default_value = ".", help = "Directory to store index files")]
    dest: PathBuf,

    #[arg(long, help = "Download again even if the file exists")]
    force: bool,

    #[arg(long, help = "JSON settings file (default: ./panukb-phewas.json if present)")]
    config: Option<String>,

    #[arg(long, help = "Print the report as JSON on stdout")]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(3),
        Err(report) => {
            eprintln!("{report:?}");
            match report.downcast_ref::<PhewasError>() {
                Some(PhewasError::ManifestRead(_))
                | Some(PhewasError::ManifestParse(_))
                | Some(PhewasError::DuplicatePhenocode(_))
                | Some(PhewasError::EmptyCatalog)
                | Some(PhewasError::ConfigRead(_))
                | Some(PhewasError::ConfigParse(_)) => ExitCode::from(2),
                _ => ExitCode::from(1),
            }
        }
    }
}

/// Returns `false` when every attempted download failed.
fn run() -> miette::Result<bool> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = SettingsLoader::resolve(cli.config.as_deref())?;
    let catalog = PhenotypeCatalog::from_path(&cli.manifest)?;
    let http = HttpClient::new(&settings)?;
    let options = PrefetchOptions {
        dest: cli.dest,
        force: cli.force,
    };

    let report = prefetch_indexes(&http, &catalog, &options, &LogSink)?;
    if cli.json {
        JsonOutput::print_prefetch(&report).into_diagnostic()?;
    } else {
        HumanOutput::write_prefetch(std::io::stderr(), &report).into_diagnostic()?;
    }
    Ok(!report.all_failed())
}
