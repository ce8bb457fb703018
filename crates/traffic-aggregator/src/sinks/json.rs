use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use tracing::info;

use crate::report::RankedReport;

use super::Reporter;

/// Writes the final ranking as pretty printed JSON. Streaming events are ignored.
#[derive(Debug, Clone)]
pub struct JsonReportWriter {
    path: PathBuf,
}

impl JsonReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for JsonReportWriter {
    fn final_report(&self, report: &RankedReport) -> io::Result<()> {
        let mut f = BufWriter::new(File::create(&self.path)?);
        let serialized = serde_json::to_vec_pretty(report)?;
        f.write_all(&serialized)?;
        f.flush()?;

        info!("Saved report to {}", self.path.display());
        Ok(())
    }
}
