pub mod config;
pub mod metrics;
pub mod pipeline;
pub mod processing;
pub mod record;
pub mod report;
pub mod sinks;
pub mod source;
