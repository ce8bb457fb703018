use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use tracing::{debug, error, info, warn};

use crate::{
    metrics::Metrics,
    sinks::Reporter,
    source::{RecordSource, SourceError, SourceSpec},
};

use super::ProducerHandle;

/// What to do with a line that does not parse into a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum MalformedPolicy {
    /// Report the line and keep reading.
    #[default]
    Skip,
    /// Report the line and end the stream.
    Abort,
}

impl Display for MalformedPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedPolicy::Skip => f.write_str("skip"),
            MalformedPolicy::Abort => f.write_str("abort"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionSettings {
    /// Simulated arrival delay before each record. Slept outside the queue lock.
    pub delay: Duration,
    pub policy: MalformedPolicy,
}

#[derive(Debug)]
pub struct IngestionOutcome {
    pub source: String,
    pub produced: u64,
    pub skipped: u64,
    pub cancelled: bool,
    pub error: Option<SourceError>,
}

impl IngestionOutcome {
    pub(crate) fn new(source: String) -> Self {
        Self {
            source,
            produced: 0,
            skipped: 0,
            cancelled: false,
            error: None,
        }
    }

    pub(crate) fn panicked(source: String) -> Self {
        let mut outcome = Self::new(source);
        outcome.error = Some(SourceError::Panicked);
        outcome
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Everything an ingestion thread needs besides its source and queue handle.
#[derive(Clone)]
pub struct IngestionContext {
    pub settings: IngestionSettings,
    pub reporter: Arc<dyn Reporter>,
    pub metrics: Metrics,
    pub cancel: Arc<AtomicBool>,
}

/// Opens `spec` and feeds its records into the queue on a dedicated thread.
///
/// The producer handle moves into the thread and is dropped when it ends, however
/// it ends, so the queue learns about exhaustion, failures and panics alike.
pub fn spawn_ingestion(
    spec: SourceSpec,
    producer: ProducerHandle,
    ctx: IngestionContext,
) -> JoinHandle<IngestionOutcome> {
    std::thread::spawn(move || {
        let (label, source) = spec.open();

        match source {
            Ok(source) => ingest(label, source, producer, &ctx),
            Err(e) => {
                error!("ingestion: could not open source {}: {}", label, e);
                drop(producer);
                ctx.reporter.source_failed(&label, &e);

                let mut outcome = IngestionOutcome::new(label);
                outcome.error = Some(e);
                outcome
            }
        }
    })
}

#[tracing::instrument(skip(source, producer, ctx))]
pub fn ingest<S: RecordSource + ?Sized>(
    label: String,
    mut source: Box<S>,
    producer: ProducerHandle,
    ctx: &IngestionContext,
) -> IngestionOutcome {
    let mut outcome = IngestionOutcome::new(label);

    loop {
        if ctx.cancel.load(Ordering::Relaxed) {
            info!("ingestion: cancellation requested, stopping {}", outcome.source);
            outcome.cancelled = true;
            break;
        }

        let Some(item) = source.next() else {
            break;
        };

        match item {
            Ok(record) => {
                if !ctx.settings.delay.is_zero() {
                    std::thread::sleep(ctx.settings.delay);
                }

                let reported = record.clone();
                if let Err(record) = producer.push(record) {
                    warn!("ingestion: queue closed, dropping {}", record);
                    break;
                }
                ctx.reporter.record_produced(&outcome.source, &reported);

                ctx.metrics.records_produced.inc();
                outcome.produced += 1;
            }
            Err(e) if e.is_malformed() && ctx.settings.policy == MalformedPolicy::Skip => {
                warn!("ingestion: skipping {}", e);
                ctx.metrics.records_malformed.inc();
                ctx.reporter.record_rejected(&outcome.source, &e);
                outcome.skipped += 1;
            }
            Err(e) => {
                if e.is_malformed() {
                    ctx.metrics.records_malformed.inc();
                }
                error!("ingestion: {} ended early: {}", outcome.source, e);
                ctx.reporter.source_failed(&outcome.source, &e);
                outcome.error = Some(e);
                break;
            }
        }
    }

    producer.finish();
    debug!(
        "ingestion: {} finished, {} produced, {} skipped",
        outcome.source, outcome.produced, outcome.skipped
    );

    outcome
}
