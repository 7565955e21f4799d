use crate::cli::{actions::Action, commands, dispatch::handler};
use anyhow::Result;
use opentelemetry::{global, trace::TracerProvider as _, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{runtime::Tokio, trace::TracerProvider, Resource};
use std::{env::var, time::Duration};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Map verbosity count to tracing level
const fn verbosity_level(verbosity: u8) -> tracing::Level {
    match verbosity {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    }
}

fn init_tracer() -> Result<opentelemetry_sdk::trace::Tracer> {
    // Endpoint and headers come from the standard OTEL_EXPORTER_OTLP_* vars.
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_timeout(Duration::from_secs(3))
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_resource(Resource::new(vec![
            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]))
        .build();

    global::set_tracer_provider(provider.clone());

    Ok(provider.tracer(env!("CARGO_PKG_NAME")))
}

/// Start the CLI
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or action
/// dispatch fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let level = verbosity_level(
        matches
            .get_one::<u8>(commands::logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );

    let fmt_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    // RUST_LOG=
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    // Spans are exported only when a collector endpoint is configured.
    if var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let telemetry = OpenTelemetryLayer::new(init_tracer()?);
        let subscriber = Registry::default()
            .with(fmt_layer)
            .with(telemetry)
            .with(env_filter);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(fmt_layer).with(env_filter);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let action = handler(&matches)?;

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(verbosity_level(0), tracing::Level::ERROR);
        assert_eq!(verbosity_level(1), tracing::Level::WARN);
        assert_eq!(verbosity_level(2), tracing::Level::INFO);
        assert_eq!(verbosity_level(3), tracing::Level::DEBUG);
        assert_eq!(verbosity_level(4), tracing::Level::TRACE);
        assert_eq!(verbosity_level(200), tracing::Level::TRACE);
    }
}
