use std::{
    io,
    sync::{atomic::AtomicBool, Arc},
};

use thiserror::Error;
use tracing::{error, info};

use crate::{
    metrics::Metrics,
    processing::{
        aggregation_consumer, spawn_ingestion, AggregateMap, IngestionContext, IngestionOutcome,
        IngestionSettings, SharedQueue, SharedTotals,
    },
    report::{RankedReport, DEFAULT_TOP_N},
    sinks::Reporter,
    source::{SourceError, SourceSpec},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub top_n: usize,
    pub ingestion: IngestionSettings,
    /// Queue bound; `None` for an unbounded queue.
    pub capacity: Option<usize>,
    pub aggregators: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            ingestion: IngestionSettings::default(),
            capacity: None,
            aggregators: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no record sources configured")]
    NoSources,
    #[error("{0} aggregation thread(s) panicked")]
    AggregatorPanicked(usize),
    #[error("failed to emit final report: {0}")]
    Report(#[from] io::Error),
}

#[derive(Debug)]
pub struct RunSummary {
    pub report: RankedReport,
    pub totals: AggregateMap,
    pub ingestion: Vec<IngestionOutcome>,
    pub consumed: u64,
}

impl RunSummary {
    pub fn produced(&self) -> u64 {
        self.ingestion.iter().map(|o| o.produced).sum()
    }

    pub fn skipped(&self) -> u64 {
        self.ingestion.iter().map(|o| o.skipped).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &IngestionOutcome> {
        self.ingestion.iter().filter(|o| !o.is_success())
    }

    pub fn cancelled(&self) -> bool {
        self.ingestion.iter().any(|o| o.cancelled)
    }

    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Wires record sources, the shared queue and aggregation threads together for a
/// single run.
pub struct Pipeline {
    options: PipelineOptions,
    reporter: Arc<dyn Reporter>,
    metrics: Metrics,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions, metrics: Metrics) -> Self {
        Self {
            options,
            reporter: Arc::new(Vec::<Box<dyn Reporter>>::new()),
            metrics,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Producers stop reading once `cancel` is set; whatever they enqueued before
    /// is still aggregated and reported.
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs one ingestion thread per source and `aggregators` aggregation threads,
    /// waits for all of them and hands the ranked result to the reporter.
    ///
    /// Source failures do not fail the run: they are recorded in the summary and the
    /// records delivered before the failure are still counted.
    pub fn run(&self, sources: Vec<SourceSpec>) -> Result<RunSummary, PipelineError> {
        if sources.is_empty() {
            return Err(PipelineError::NoSources);
        }

        let aggregators = self.options.aggregators.max(1);
        let queue = Arc::new(SharedQueue::new(self.options.capacity));
        let totals = SharedTotals::default();

        // Every producer is registered before the queue is sealed, so consumers
        // cannot observe a closed queue before ingestion has started.
        let producers = sources
            .into_iter()
            .map(|spec| (spec, queue.register_producer()))
            .collect::<Vec<_>>();
        queue.seal();

        info!(
            "Starting {} ingestion thread(s) and {} aggregation thread(s)",
            producers.len(),
            aggregators
        );

        let consumers = (0..aggregators)
            .map(|worker| {
                let queue = Arc::clone(&queue);
                let totals = totals.clone();
                let reporter = Arc::clone(&self.reporter);
                let metrics = self.metrics.clone();
                std::thread::spawn(move || {
                    aggregation_consumer(worker, queue, totals, reporter, metrics)
                })
            })
            .collect::<Vec<_>>();

        let ctx = IngestionContext {
            settings: self.options.ingestion.clone(),
            reporter: Arc::clone(&self.reporter),
            metrics: self.metrics.clone(),
            cancel: Arc::clone(&self.cancel),
        };

        let handles = producers
            .into_iter()
            .map(|(spec, producer)| {
                let label = spec.label().to_string();
                (label, spawn_ingestion(spec, producer, ctx.clone()))
            })
            .collect::<Vec<_>>();

        let ingestion = handles
            .into_iter()
            .map(|(label, handle)| {
                handle.join().unwrap_or_else(|_| {
                    error!("pipeline: ingestion thread for {} panicked", label);
                    self.reporter.source_failed(&label, &SourceError::Panicked);
                    IngestionOutcome::panicked(label)
                })
            })
            .collect::<Vec<_>>();

        let mut consumed = 0;
        let mut panicked = 0;
        for consumer in consumers {
            match consumer.join() {
                Ok(n) => consumed += n,
                Err(_) => panicked += 1,
            }
        }

        if panicked > 0 {
            error!("pipeline: {} aggregation thread(s) panicked", panicked);
            return Err(PipelineError::AggregatorPanicked(panicked));
        }

        let totals = totals.snapshot();
        let report = totals.ranked(self.options.top_n);
        self.reporter.final_report(&report)?;

        let summary = RunSummary {
            report,
            totals,
            ingestion,
            consumed,
        };

        info!(
            "Run finished: {} produced, {} consumed, {} skipped, {} failed source(s)",
            summary.produced(),
            summary.consumed,
            summary.skipped(),
            summary.failures().count()
        );

        Ok(summary)
    }
}
