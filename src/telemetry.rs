use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::{LoggingConfig, MetricsConfig};
use crate::utils::error::{AppError, Result};

/// Default filter when `RUST_LOG` is not set.
pub fn default_directive(level: &str) -> String {
    format!("price_drop_watcher={level},tower_http={level}")
}

/// Install the global subscriber: stdout always, plus a daily rolling file
/// when `logging.directory` is set. Keep the returned guard alive for the
/// life of the process or buffered file output is lost.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(&config.level)))
        .map_err(|e| AppError::Validation(format!("invalid log level '{}': {}", config.level, e)))?;

    let stdout = fmt::layer().with_target(true);

    let (file, guard) = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, "price-drop-watcher.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer).boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(file)
        .try_init()
        .map_err(|e| AppError::Internal(format!("tracing already initialised: {}", e)))?;

    Ok(guard)
}

/// Serve Prometheus metrics on `0.0.0.0:<port>` when enabled. Must run inside
/// the tokio runtime.
pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let address = SocketAddr::from(([0, 0, 0, 0], config.port));
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| AppError::Internal(format!("failed to install metrics exporter: {}", e)))?;

    tracing::info!(%address, "metrics exporter listening");
    Ok(())
}
