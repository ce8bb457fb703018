pub mod signal;
pub mod telemetry;
