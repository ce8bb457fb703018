extern crate dotenv;

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use tracing::info;

use traffic_aggregator::{
    config::Configuration,
    metrics::Metrics,
    pipeline::Pipeline,
    sinks::{console::ConsoleReporter, json::JsonReportWriter, Reporter},
    source::SourceSpec,
};
use traffic_common::{signal::setup_signal_handlers, telemetry::setup_telemetry};

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    setup_telemetry("traffic-aggregator")?;

    let config = Configuration::from_args()?;
    tracing::info!("Chosen configuration: {:#?}", config);

    let signal_flag = setup_signal_handlers()?;
    let (metrics, _exporter) = setup_metrics(config.metrics_port)?;
    let reporter = setup_reporters(&config);

    let pipeline = Pipeline::new(config.pipeline.clone(), metrics)
        .with_reporter(reporter)
        .with_cancellation(signal_flag);

    let sources = config.sources.iter().map(SourceSpec::file).collect();
    let summary = pipeline.run(sources)?;

    if summary.cancelled() {
        info!("Shutdown signal detected, reported partial results");
    }

    if let Some(failed) = summary.failures().next() {
        let reason = failed
            .error
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        anyhow::bail!("ingestion of {} failed: {}", failed.source, reason);
    }

    Ok(())
}

fn setup_metrics(
    port: Option<u16>,
) -> Result<(Metrics, Option<prometheus_exporter::Exporter>)> {
    let metrics = Metrics::new()?;

    let exporter = match port {
        Some(port) => {
            metrics.register()?;
            let binding: SocketAddr = format!("0.0.0.0:{port}").parse()?;
            let exporter = prometheus_exporter::start(binding)?;
            info!("Serving metrics on {}", binding);
            Some(exporter)
        }
        None => None,
    };

    Ok((metrics, exporter))
}

fn setup_reporters(config: &Configuration) -> Arc<dyn Reporter> {
    let mut reporters: Vec<Box<dyn Reporter>> =
        vec![Box::new(ConsoleReporter::stdout(!config.quiet))];

    if let Some(path) = &config.report_json {
        reporters.push(Box::new(JsonReportWriter::new(path)));
        info!("Configured JSON report at {}", path.display());
    }

    Arc::new(reporters)
}
