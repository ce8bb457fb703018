use crate::{record::Record, report::RankedReport, source::SourceError};

/// Receives what the pipeline observes. Streaming callbacks are invoked from
/// ingestion and aggregation threads concurrently and must not block for long.
pub trait Reporter: Send + Sync {
    /// A record was read and is about to be enqueued.
    fn record_produced(&self, _source: &str, _record: &Record) {}

    /// A record was applied to the aggregate.
    fn record_consumed(&self, _record: &Record) {}

    /// A malformed line was skipped.
    fn record_rejected(&self, _source: &str, _error: &SourceError) {}

    /// A source stopped delivering records because of `error`.
    fn source_failed(&self, _source: &str, _error: &SourceError) {}

    /// Called once, after every aggregation thread has finished.
    fn final_report(&self, _report: &RankedReport) -> std::io::Result<()> {
        Ok(())
    }
}

impl Reporter for Vec<Box<dyn Reporter>> {
    fn record_produced(&self, source: &str, record: &Record) {
        self.iter().for_each(|r| r.record_produced(source, record));
    }

    fn record_consumed(&self, record: &Record) {
        self.iter().for_each(|r| r.record_consumed(record));
    }

    fn record_rejected(&self, source: &str, error: &SourceError) {
        self.iter().for_each(|r| r.record_rejected(source, error));
    }

    fn source_failed(&self, source: &str, error: &SourceError) {
        self.iter().for_each(|r| r.source_failed(source, error));
    }

    fn final_report(&self, report: &RankedReport) -> std::io::Result<()> {
        for reporter in self.iter() {
            reporter.final_report(report)?;
        }
        Ok(())
    }
}
