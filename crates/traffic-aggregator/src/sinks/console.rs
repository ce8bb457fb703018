use std::{
    io::{self, Stdout, Write},
    sync::{Mutex, MutexGuard, PoisonError},
};

use tracing::warn;

use crate::{record::Record, report::RankedReport, source::SourceError};

use super::Reporter;

const HEADER: &str = "--- Top Congested Traffic Lights ---";
const FOOTER: &str = "------------------------------------";

/// Human readable output. Per-record lines are only written when `verbose` is set;
/// failures and the final ranking are always written.
pub struct ConsoleReporter<W: Write + Send> {
    out: Mutex<W>,
    verbose: bool,
}

impl ConsoleReporter<Stdout> {
    pub fn stdout(verbose: bool) -> Self {
        Self::new(io::stdout(), verbose)
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W, verbose: bool) -> Self {
        Self {
            out: Mutex::new(out),
            verbose,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn out(&self) -> MutexGuard<'_, W> {
        self.out.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn line(&self, args: std::fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out(), "{}", args) {
            warn!("console: failed to write output: {}", e);
        }
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn record_produced(&self, _source: &str, record: &Record) {
        if self.verbose {
            self.line(format_args!("[producer] read {}", record));
        }
    }

    fn record_consumed(&self, record: &Record) {
        if self.verbose {
            self.line(format_args!(
                "[consumer] processed {} - {} ({} cars)",
                record.timestamp, record.light, record.count
            ));
        }
    }

    fn record_rejected(&self, source: &str, error: &SourceError) {
        if self.verbose {
            self.line(format_args!("[producer] {}: skipped {}", source, error));
        }
    }

    fn source_failed(&self, source: &str, error: &SourceError) {
        self.line(format_args!("[error] {}: {}", source, error));
    }

    fn final_report(&self, report: &RankedReport) -> io::Result<()> {
        let mut out = self.out();
        writeln!(out)?;
        writeln!(out, "{}", HEADER)?;
        write!(out, "{}", report)?;
        writeln!(out, "{}", FOOTER)?;
        out.flush()
    }
}
