use prometheus_exporter::prometheus::{self, IntCounter};

/// Pipeline counters. Clones share the underlying counters, so every thread can
/// hold its own copy.
#[derive(Clone)]
pub struct Metrics {
    pub records_produced: IntCounter,
    pub records_consumed: IntCounter,
    pub records_malformed: IntCounter,
    pub vehicles_counted: IntCounter,
}

impl Metrics {
    /// Creates counters that are not yet visible to any exporter.
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            records_produced: IntCounter::new(
                "records_produced",
                "Records enqueued by ingestion threads",
            )?,
            records_consumed: IntCounter::new(
                "records_consumed",
                "Records applied to the aggregate by aggregation threads",
            )?,
            records_malformed: IntCounter::new(
                "records_malformed",
                "Lines that could not be parsed into a record",
            )?,
            vehicles_counted: IntCounter::new(
                "vehicles_counted",
                "Sum of vehicle counts applied to the aggregate",
            )?,
        })
    }

    /// Registers all counters in the default registry served by the exporter.
    pub fn register(&self) -> prometheus::Result<()> {
        prometheus::register(Box::new(self.records_produced.clone()))?;
        prometheus::register(Box::new(self.records_consumed.clone()))?;
        prometheus::register(Box::new(self.records_malformed.clone()))?;
        prometheus::register(Box::new(self.vehicles_counted.clone()))?;
        Ok(())
    }
}
