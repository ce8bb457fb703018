use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde::Serialize;
use thiserror::Error;

/// A single sensor reading: how many vehicles passed a traffic light at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub timestamp: String,
    pub light: String,
    pub count: u64,
}

impl Record {
    pub fn new(timestamp: impl Into<String>, light: impl Into<String>, count: u64) -> Self {
        Self {
            timestamp: timestamp.into(),
            light: light.into(),
            count,
        }
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {} cars)", self.timestamp, self.light, self.count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected 3 comma separated fields, found {0}")]
    MissingFields(usize),
    #[error("empty {0} field")]
    EmptyField(&'static str),
    #[error("invalid vehicle count {value:?}: {source}")]
    InvalidCount {
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Parses `timestamp,light,count`. Fields are trimmed and anything after the third
/// field is ignored.
impl FromStr for Record {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.split(',').map(str::trim);

        let (timestamp, light, count) = match (fields.next(), fields.next(), fields.next()) {
            (Some(timestamp), Some(light), Some(count)) => (timestamp, light, count),
            _ => return Err(ParseError::MissingFields(line.split(',').count())),
        };

        if timestamp.is_empty() {
            return Err(ParseError::EmptyField("timestamp"));
        }
        if light.is_empty() {
            return Err(ParseError::EmptyField("light"));
        }

        let count = count.parse::<u64>().map_err(|source| ParseError::InvalidCount {
            value: count.to_string(),
            source,
        })?;

        Ok(Record::new(timestamp, light, count))
    }
}
