use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

/// Installs the global tracing subscriber. Filtering follows `RUST_LOG`; log output
/// goes to stderr so it never interleaves with report lines on stdout.
pub fn setup_telemetry(service_name: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    Registry::default()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()?;

    info!(service = service_name, "Successfully setup telemetry");

    Ok(())
}
