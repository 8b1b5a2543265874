//! hybrid-scan entrypoint: loads every model artifact once, then scores files,
//! directories or a single upload read from stdin. One JSON report per line
//! goes to stdout; logs go to stderr.

use chrono::Utc;
use clap::{Parser, Subcommand};
use hybrid_scan::{
    config::ScannerConfig,
    features::{catalog_names, extract_executable, FeatureCatalog, FeatureSchema},
    input::{collect_files, SpooledUpload},
    logging::StructuredLogger,
    model::ModelArtifacts,
    report::{FailedScan, ScanRecord},
    scan::{ScanContext, Scanner},
};
use serde_json::json;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "hybrid-scan")]
#[command(about = "Hybrid static malware scanner (autoencoder gate + family classifier)")]
struct Cli {
    /// Config file; defaults to $HYBRID_SCAN_CONFIG, then hybrid-scan.json
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the model artifact directory
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan executables or feature CSVs
    Scan {
        /// Files or directories
        #[arg(required_unless_present = "stdin")]
        paths: Vec<PathBuf>,

        /// Read a single upload from stdin instead of paths
        #[arg(long, conflicts_with = "paths", requires = "name")]
        stdin: bool,

        /// Client-side file name of the stdin upload
        #[arg(long)]
        name: Option<String>,

        /// Only pick up files with executable magic when walking directories
        #[arg(long)]
        executables_only: bool,

        /// Worker threads (0 = one per core)
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Print the normalized feature vector of an executable
    Features {
        path: PathBuf,
    },
    /// Print the trained feature schema and class list
    Schema,
}

type CliResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .or_else(|| std::env::var_os("HYBRID_SCAN_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("hybrid-scan.json"));
    let mut config = ScannerConfig::load(&config_path);
    if let Some(dir) = cli.model_dir {
        config.model_dir = dir;
    }
    if cli.json_logs {
        config.log.json = true;
    }

    StructuredLogger::init(config.log.json, &config.log.level);
    info!(config = %config_path.display(), model_dir = %config.model_dir.display(), "hybrid-scan starting");

    match cli.command {
        Command::Scan {
            paths,
            stdin,
            name,
            executables_only,
            threads,
        } => {
            let context = Arc::new(ScanContext::load(&config)?);
            let scanner = Scanner::new(context, threads.unwrap_or(config.scan.threads))?;
            if stdin {
                scan_stdin(&scanner, name.as_deref().unwrap_or("upload"))
            } else {
                let executables_only = executables_only || config.scan.executables_only;
                scan_paths(&scanner, &paths, executables_only)
            }
        }
        Command::Features { path } => print_features(&config, &path),
        Command::Schema => print_schema(&config),
    }
}

fn scan_paths(scanner: &Scanner, paths: &[PathBuf], executables_only: bool) -> CliResult<()> {
    let files = collect_files(paths, executables_only);
    if files.is_empty() {
        warn!("no files to scan");
        return Ok(());
    }
    info!(files = files.len(), "scanning");
    let records = scanner.scan_many(&files);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        StructuredLogger::emit_json(record, &mut out)?;
    }
    out.flush()?;

    let flagged = records.iter().filter(|r| r.is_malware()).count();
    let failed = records
        .iter()
        .filter(|r| matches!(r, ScanRecord::Failed(_)))
        .count();
    info!(scanned = records.len(), flagged, failed, "scan complete");
    Ok(())
}

fn scan_stdin(scanner: &Scanner, name: &str) -> CliResult<()> {
    // Removed from disk when `upload` drops, whatever the outcome.
    let upload = SpooledUpload::from_reader(io::stdin().lock(), name)?;
    let record = match scanner.scan_named(upload.path(), upload.name()) {
        Ok(report) => ScanRecord::Report(report),
        Err(e) => {
            warn!(file = upload.name(), error = %e, "scan failed");
            ScanRecord::Failed(FailedScan::new(upload.name(), e.to_string(), Utc::now()))
        }
    };
    let mut out = io::stdout().lock();
    StructuredLogger::emit_json(&record, &mut out)?;
    out.flush()?;
    Ok(())
}

fn print_features(config: &ScannerConfig, path: &Path) -> CliResult<()> {
    let schema = match ModelArtifacts::read_schema(config) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "no trained schema; printing every catalog feature");
            FeatureSchema::new(catalog_names().map(str::to_string).collect())?
        }
    };
    let vector = extract_executable(path, &Arc::new(schema), config.extraction.max_file_bytes)?;
    let mut out = io::stdout().lock();
    StructuredLogger::emit_json(
        &json!({ "fileName": path.display().to_string(), "features": vector }),
        &mut out,
    )?;
    Ok(())
}

fn print_schema(config: &ScannerConfig) -> CliResult<()> {
    let schema = ModelArtifacts::read_schema(config)?;
    let classes = ModelArtifacts::read_classes(config)?;
    let unknown: Vec<&str> = schema
        .names()
        .iter()
        .map(String::as_str)
        .filter(|n| !FeatureCatalog::global().contains(n))
        .collect();
    let mut out = io::stdout().lock();
    StructuredLogger::emit_json(
        &json!({
            "features": schema.names(),
            "classes": classes,
            "notExtractable": unknown,
        }),
        &mut out,
    )?;
    Ok(())
}
