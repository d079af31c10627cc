use clap::{Parser, Subcommand};
use rethumb::config::{self, Config};
use rethumb::imaging::RustBackend;
use rethumb::reconcile::{self, ReconcileConfig};
use rethumb::store::SqliteStore;
use rethumb::{audit, output};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rethumb")]
#[command(about = "Reconcile media library thumbnails against a size policy")]
#[command(long_about = "\
Reconcile media library thumbnails against a size policy

Every image attachment in the metadata store gets one derivative per
configured size. rethumb walks all attachments and, for each one:

  - corrects the declared MIME type from the file extension
  - corrects the _attached_file path and the recorded source dimensions
  - drops derivative entries that are stale, missing or mis-sized
  - renders the sizes that are missing (written atomically)
  - deletes derivative files nothing references any more

Re-running on a reconciled library changes nothing.

Run 'rethumb gen-config' to generate a documented rethumb.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile every attachment with the size policy and the disk
    Reconcile,
    /// Report images on disk nothing references, and references with no file
    Audit {
        /// Directory for the report files
        #[arg(long, default_value = ".")]
        report_dir: PathBuf,
        /// Where the generated move script puts unused images
        #[arg(long, default_value = audit::DEFAULT_MOVE_DESTINATION)]
        move_to: PathBuf,
    },
    /// Create the metadata store schema if missing
    InitDb,
    /// Print a stock rethumb.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Reconcile => {
            let (config, _log_guard) = setup(&cli.config)?;
            let store = SqliteStore::open(&config.database)?;
            let backend = RustBackend::new();
            let settings = ReconcileConfig::from_config(&config);
            tracing::info!(
                root = %config.media_root.display(),
                sizes = config.sizes.len(),
                "reconciling attachments"
            );
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    let line = output::format_event(&event);
                    if output::is_warning(&event) {
                        tracing::warn!("{line}");
                    } else {
                        tracing::info!("{line}");
                    }
                }
            });
            let result = reconcile::reconcile(&store, &backend, &settings, Some(tx));
            printer.join().ok();
            let summary = result?;
            for line in output::format_summary(&summary) {
                println!("{}", line);
            }
        }
        Command::Audit { report_dir, move_to } => {
            let (config, _log_guard) = setup(&cli.config)?;
            let store = SqliteStore::open(&config.database)?;
            let report = audit::audit(&store, &config.media_root, config.page_size)?;
            let written = audit::write_reports(&report, &report_dir, &config.media_root, &move_to)?;
            for line in output::format_audit(&report, &written) {
                println!("{}", line);
            }
        }
        Command::InitDb => {
            let (config, _log_guard) = setup(&cli.config)?;
            SqliteStore::create(&config.database)?;
            println!("Metadata store ready: {}", config.database.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load and validate the config, then start logging.
fn setup(path: &Path) -> Result<(Config, Option<WorkerGuard>), config::ConfigError> {
    let config = config::load_config(path)?;
    let guard = init_tracing(config.error_log.as_deref());
    Ok((config, guard))
}

/// Console logging filtered by `RUST_LOG` (default `rethumb=info`), plus an
/// optional WARN-only file layer for `error_log`.
fn init_tracing(error_log: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rethumb=info"));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .without_time()
        .with_filter(env_filter);
    let registry = tracing_subscriber::registry().with(console);

    match error_log {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("rethumb-errors.log");
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(LevelFilter::WARN);
            registry.with(file).init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}
