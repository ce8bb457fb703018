mod aggregation;
mod ingestion;
mod queue;

pub use aggregation::{aggregation_consumer, AggregateMap, ConsumerState, SharedTotals};
pub use ingestion::{
    ingest, spawn_ingestion, IngestionContext, IngestionOutcome, IngestionSettings,
    MalformedPolicy,
};
pub use queue::{ProducerHandle, SharedQueue};
