use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::{debug, trace};

use crate::{metrics::Metrics, record::Record, report::RankedReport, sinks::Reporter};

use super::SharedQueue;

/// Running vehicle totals per light.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateMap {
    totals: HashMap<String, u64>,
}

impl AggregateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals saturate at `u64::MAX` instead of wrapping.
    pub fn apply(&mut self, record: &Record) {
        self.totals
            .entry(record.light.clone())
            .and_modify(|total| *total = total.saturating_add(record.count))
            .or_insert(record.count);
    }

    pub fn get(&self, light: &str) -> Option<u64> {
        self.totals.get(light).copied()
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Sum over all lights.
    pub fn total(&self) -> u64 {
        self.totals.values().copied().fold(0, u64::saturating_add)
    }

    pub fn ranked(&self, top_n: usize) -> RankedReport {
        RankedReport::from_totals(&self.totals, top_n)
    }
}

/// Totals shared by every aggregation thread of a run.
#[derive(Debug, Clone, Default)]
pub struct SharedTotals(Arc<Mutex<AggregateMap>>);

impl SharedTotals {
    pub fn lock(&self) -> MutexGuard<'_, AggregateMap> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> AggregateMap {
        self.lock().clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    Waiting,
    Draining,
    Done,
}

/// Drains `queue` into `totals` until the queue is closed and empty, returning the
/// number of records this consumer applied.
///
/// Each batch is taken under the queue lock and applied after releasing it, so
/// ingestion threads are never blocked by aggregation work.
#[tracing::instrument(skip(queue, totals, reporter, metrics))]
pub fn aggregation_consumer(
    worker: usize,
    queue: Arc<SharedQueue>,
    totals: SharedTotals,
    reporter: Arc<dyn Reporter>,
    metrics: Metrics,
) -> u64 {
    let _guard = AbandonOnPanic(&queue);
    let mut state = ConsumerState::Waiting;
    let mut consumed = 0;

    while let Some(batch) = queue.next_batch() {
        state = transition(worker, state, ConsumerState::Draining);

        {
            let mut totals = totals.lock();
            batch.iter().for_each(|record| totals.apply(record));
        }

        for record in batch.iter() {
            metrics.records_consumed.inc();
            metrics.vehicles_counted.inc_by(record.count);
            reporter.record_consumed(record);
        }
        consumed += batch.len() as u64;

        state = transition(worker, state, ConsumerState::Waiting);
    }

    transition(worker, state, ConsumerState::Done);
    debug!("aggregation: worker {} done after {} records", worker, consumed);

    consumed
}

struct AbandonOnPanic<'a>(&'a SharedQueue);

impl Drop for AbandonOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("aggregation: worker panicked, abandoning queue");
            self.0.abandon();
        }
    }
}

fn transition(worker: usize, from: ConsumerState, to: ConsumerState) -> ConsumerState {
    trace!(worker, ?from, ?to, "aggregation: state change");
    to
}
