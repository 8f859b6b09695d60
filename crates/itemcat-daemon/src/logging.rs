use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::{EnvFilter, Registry};

use itemcat::{LogFormat, LoggingConfig};

use crate::DaemonError;

fn build_stdout_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Text => Box::new(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(true)
                .with_current_span(true)
                .with_span_list(true),
        ),
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured
/// level; `log` records from dependencies are forwarded into tracing.
pub fn init(config: &LoggingConfig) -> Result<(), DaemonError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| DaemonError::Logging(format!("Invalid log level '{}': {}", config.level, e)))?;

    let subscriber = Registry::default()
        .with(build_stdout_layer(config.format))
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| DaemonError::Logging(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| DaemonError::Logging(e.to_string()))?;
    Ok(())
}
