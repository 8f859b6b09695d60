mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};
use thiserror::Error;
use tokio::sync::broadcast;

use itemcat::config::default_config_path;
use itemcat::db::seed;
use itemcat::{load_config, Config, Database, IngestWorker, ItemcatError, UploadPoller};

#[derive(Error, Debug)]
pub enum DaemonError {
    #[error(transparent)]
    Itemcat(#[from] ItemcatError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Failed to create directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start upload poller: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// First CLI argument, else the default config file if present, else
/// built-in defaults.
fn resolve_config() -> Result<Config, DaemonError> {
    if let Some(path) = std::env::args_os().nth(1) {
        return Ok(load_config(PathBuf::from(path)).map_err(ItemcatError::from)?);
    }
    let default_path = default_config_path();
    if default_path.exists() {
        return Ok(load_config(&default_path).map_err(ItemcatError::from)?);
    }
    Ok(Config::default())
}

fn run(config: Config) -> Result<(), DaemonError> {
    info!("Starting itemcat daemon v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::open(Path::new(&config.database_path)).map_err(ItemcatError::from)?;
    if config.seed_defaults {
        seed::run(&db).map_err(ItemcatError::from)?;
    }

    let upload_dir = PathBuf::from(&config.upload_directory);
    std::fs::create_dir_all(&upload_dir).map_err(|e| DaemonError::CreateDir {
        path: upload_dir.clone(),
        source: e,
    })?;

    let worker = Arc::new(IngestWorker::new(db));
    let poller = UploadPoller::new(worker, config.poll_interval());
    let (trigger_tx, trigger_rx) = broadcast::channel(16);
    let handle = poller.start(trigger_rx).map_err(DaemonError::Spawn)?;
    info!(
        "Polling for uploads every {} ms",
        config.poll_interval_ms
    );

    let (stop_tx, stop_rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })?;
    let _ = stop_rx.recv();

    info!("Shutting down");
    poller.stop();
    // Wake the poll loop so it sees the shutdown
    let _ = trigger_tx.send(());
    if handle.join().is_err() {
        error!("Upload poller thread panicked");
    }
    Ok(())
}

fn main() -> ExitCode {
    let config = match resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("itemcat-daemon: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("itemcat-daemon: {}", e);
        return ExitCode::FAILURE;
    }

    match run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
