//! Wires configured collectors and readers onto one meter.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use otlp_network_core::collector::{FileSystem, ProcSource};
use otlp_network_core::telemetry::{Meter, OtlpHttpExporter, Readers, Resource};

use crate::config::Config;

const SERVICE_NAME: &str = "otlp-network";

/// Registers every enabled collector over `fs` and builds the reader set.
///
/// The push reader is added only when `otel.endpoint` is set.
pub fn build_readers<F: FileSystem + 'static>(fs: F, config: &Config) -> Result<Readers> {
    let source = Arc::new(
        ProcSource::new(fs, &config.proc_path).context("opening proc filesystem")?,
    );

    let mut meter = Meter::new(Resource::new(SERVICE_NAME, otlp_network_core::VERSION));
    let options = config.collector_options();
    for kind in config.enabled_collectors() {
        kind.register(&mut meter, &source, &options)
            .with_context(|| format!("registering {kind} collector"))?;
    }
    info!(
        collectors = ?meter.collectors().collect::<Vec<_>>(),
        instruments = meter.instruments().len(),
        proc_path = %config.proc_path.display(),
        "collectors registered"
    );

    let readers = Readers::new(Arc::new(meter));
    if config.otel.endpoint.is_empty() {
        return Ok(readers);
    }

    let exporter = OtlpHttpExporter::new(
        &config.otel.endpoint,
        config.otel.insecure,
        config.otel.timeout,
    )
    .context("creating OTLP exporter")?;
    info!(
        url = exporter.url(),
        interval_ms = config.otel.interval.as_millis() as u64,
        "OTLP push enabled"
    );
    Ok(readers.with_push(Arc::new(exporter), config.otel.interval))
}
