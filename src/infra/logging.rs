//! For setting up logging.

use super::config::LoggingConfig;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{trace::Tracer, Resource};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_LOG_LEVEL: &str = "info,tower_http=debug,greeting_api=debug";

/// Flushes logs upon being dropped.
#[derive(Debug)]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
    otlp: bool,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        if self.otlp {
            opentelemetry::global::shutdown_tracer_provider();
        }
    }
}

/// Initializes logging.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LogGuard> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into());

    let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_stdout)
        .with_filter(EnvFilter::new(&log_level));

    let tracer = config.otlp_endpoint.as_deref().map(otlp_tracer).transpose()?;
    let otlp = tracer.is_some();
    let opentelemetry = tracer.map(|tracer| {
        tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(EnvFilter::new(&log_level))
    });

    tracing_subscriber::registry()
        .with(stdout)
        .with(opentelemetry)
        .with(ErrorLayer::default())
        .init();

    Ok(LogGuard {
        _guards: vec![stdout_guard],
        otlp,
    })
}

/// Builds a batching tracer that ships spans to an OTLP collector.
fn otlp_tracer(endpoint: &str) -> anyhow::Result<Tracer> {
    let app_name = env!("CARGO_PKG_NAME");
    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint);
    let tracer = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::config()
                .with_resource(Resource::new(vec![KeyValue::new("service.name", app_name)])),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)?;
    Ok(tracer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn otlp_tracer_is_built_for_a_well_formed_endpoint() {
        assert!(otlp_tracer("http://localhost:4317").is_ok());
    }

    #[tokio::test]
    async fn logging_initializes_without_an_otlp_endpoint() {
        let guard = init_logging(&LoggingConfig::default()).unwrap();
        assert!(!guard.otlp);
        tracing::info!("logging initialized");
    }
}
