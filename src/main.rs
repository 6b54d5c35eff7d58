use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use takeout_catalog::config::ScannerConfig;
use takeout_catalog::db::open_catalog;
use takeout_catalog::scan::orchestrator::ParallelScanner;
use takeout_catalog::scan::summary::generate_summary;

/// Build a queryable catalog from a Google Photos Takeout tree.
#[derive(Parser, Debug)]
#[command(name = "takeout-catalog", version, about)]
struct Cli {
    /// Takeout tree to scan (the directory containing `Takeout/`).
    target: PathBuf,

    /// Catalog database path. Defaults to the platform data directory.
    #[arg(long)]
    database: Option<PathBuf>,

    /// I/O coordinator thread count.
    #[arg(long)]
    worker_threads: Option<usize>,

    /// CPU worker count.
    #[arg(long)]
    worker_processes: Option<usize>,

    /// Enable RAW EXIF extraction via exiftool.
    #[arg(long)]
    use_exiftool: bool,

    /// Enable video metadata extraction via ffprobe.
    #[arg(long)]
    use_ffprobe: bool,

    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("takeout-catalog")
        .join("catalog.db")
}

fn init_logging(config: &ScannerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));

    let json = config.log.format == "json";
    match config.log.file.as_ref().and_then(|p| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(p)
            .ok()
    }) {
        Some(file) => {
            let subscriber = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            if json {
                subscriber.json().init();
            } else {
                subscriber.init();
            }
        }
        None => {
            let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
            if json {
                subscriber.json().init();
            } else {
                subscriber.init();
            }
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => match ScannerConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("cannot load config: {}", e);
                return ExitCode::from(1);
            }
        },
        None => ScannerConfig::default(),
    };

    // Command-line flags override the config file.
    if cli.worker_threads.is_some() {
        config.worker_threads = cli.worker_threads;
    }
    if cli.worker_processes.is_some() {
        config.worker_processes = cli.worker_processes;
    }
    if cli.use_exiftool {
        config.use_exiftool = true;
    }
    if cli.use_ffprobe {
        config.use_ffprobe = true;
    }

    init_logging(&config);

    let db_path = cli.database.unwrap_or_else(default_database_path);
    tracing::info!("catalog: {:?}", db_path);

    let scanner = ParallelScanner::new(db_path.clone(), config.scanner_options());

    // Ctrl-C sets the shared cancellation flag; workers observe it on their
    // next queue poll and the scan winds down to exit code 130.
    let cancel = scanner.cancel_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, cancelling scan");
        cancel.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("cannot install interrupt handler: {}", e);
    }

    match scanner.scan(&cli.target) {
        Ok(outcome) if outcome.cancelled => {
            tracing::warn!("scan interrupted after {} files", outcome.files_processed);
            ExitCode::from(130)
        }
        Ok(outcome) => {
            match open_catalog(&db_path)
                .map_err(|e| e.to_string())
                .and_then(|conn| {
                    generate_summary(&conn, &outcome.scan_run_id).map_err(|e| e.to_string())
                }) {
                Ok(summary) => print!("{}", summary.render()),
                Err(e) => tracing::warn!("cannot render summary: {}", e),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("scan failed: {}", e);
            ExitCode::from(1)
        }
    }
}
