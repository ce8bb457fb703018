use std::{
    fs::File,
    io::{self, BufRead, BufReader, Lines},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::record::{ParseError, Record};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("could not open {}: {source}", .path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read line {line_number}: {source}")]
    Read {
        line_number: usize,
        #[source]
        source: io::Error,
    },
    #[error("malformed record on line {line_number} ({line:?}): {reason}")]
    Malformed {
        line_number: usize,
        line: String,
        #[source]
        reason: ParseError,
    },
    #[error("ingestion thread panicked")]
    Panicked,
}

impl SourceError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, SourceError::Malformed { .. })
    }
}

/// A finite stream of parsed records. `None` marks the end of the stream.
pub trait RecordSource: Iterator<Item = Result<Record, SourceError>> + Send {}

impl<I> RecordSource for I where I: Iterator<Item = Result<Record, SourceError>> + Send {}

pub type BoxedSource = Box<dyn RecordSource>;

/// Reads `timestamp,light,count` lines. Blank lines are passed over without being
/// reported.
pub struct LineSource<R> {
    lines: Lines<R>,
    line_number: usize,
}

impl LineSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| SourceError::Unavailable {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> LineSource<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for LineSource<R> {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;

            let line = match line {
                Ok(line) => line,
                Err(source) => {
                    return Some(Err(SourceError::Read {
                        line_number: self.line_number,
                        source,
                    }))
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            return Some(line.parse::<Record>().map_err(|reason| SourceError::Malformed {
                line_number: self.line_number,
                reason,
                line,
            }));
        }
    }
}

type OpenFn = Box<dyn FnOnce() -> Result<BoxedSource, SourceError> + Send>;

/// A named, not yet opened record source. Opening is deferred to the ingestion
/// thread so that a failing open is handled like any other ingestion failure.
pub struct SourceSpec {
    label: String,
    open: OpenFn,
}

impl SourceSpec {
    pub fn new<F, S>(label: impl Into<String>, open: F) -> Self
    where
        F: FnOnce() -> Result<S, SourceError> + Send + 'static,
        S: RecordSource + 'static,
    {
        Self {
            label: label.into(),
            open: Box::new(move || open().map(|s| Box::new(s) as BoxedSource)),
        }
    }

    pub fn file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self::new(path.display().to_string(), move || LineSource::open(path))
    }

    pub fn reader<R>(label: impl Into<String>, reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        Self::new(label, move || Ok(LineSource::from_reader(reader)))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn open(self) -> (String, Result<BoxedSource, SourceError>) {
        (self.label, (self.open)())
    }
}

impl std::fmt::Debug for SourceSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceSpec")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
