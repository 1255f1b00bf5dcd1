//! Second-resolution time spans used as search filters

use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use std::fmt;

/// Format of the date bounds accepted on the command line (local time)
pub const LOCAL_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of the date bounds sent to the search endpoint (UTC)
pub const API_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Inclusive time interval, in whole seconds since the Unix epoch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Span {
    min: i64,
    max: i64,
}

impl Span {
    /// Create a span; `min` must not be after `max`
    pub fn new(min: i64, max: i64) -> Result<Self> {
        if min > max {
            return Err(Error::config(
                format!("span start {min} is after span end {max}"),
                "span",
            ));
        }
        Ok(Self { min, max })
    }

    /// Span between two local wall-clock times formatted as `YYYY-MM-DD HH:MM:SS`
    pub fn from_local(min: &str, max: &str) -> Result<Self> {
        Self::new(parse_local(min, "min")?, parse_local(max, "max")?)
    }

    /// First second of the span
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Last second of the span
    pub fn max(&self) -> i64 {
        self.max
    }

    /// Number of seconds covered
    pub fn seconds(&self) -> u64 {
        self.max.abs_diff(self.min) + 1
    }

    /// Split in two adjacent halves at the time midpoint
    ///
    /// Returns `None` for a one-second span. Otherwise both halves are non-empty,
    /// the first starts at `min`, the second ends at `max` and they share no second.
    pub fn split(&self) -> Option<(Span, Span)> {
        if self.min == self.max {
            return None;
        }
        // rounded up so a two-second span still yields two halves
        let mid = self.min + (self.max - self.min + 1) / 2;
        Some((
            Span {
                min: self.min,
                max: mid - 1,
            },
            Span {
                min: mid,
                max: self.max,
            },
        ))
    }

    /// Lower bound in the search endpoint's timestamp format
    pub fn api_min(&self) -> String {
        format_api(self.min)
    }

    /// Upper bound in the search endpoint's timestamp format
    pub fn api_max(&self) -> String {
        format_api(self.max)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.api_min(), self.api_max())
    }
}

/// A span paired with the true number of matches it held when probed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem {
    /// Range to enumerate
    pub span: Span,
    /// Matches still to fetch; starts at the probed count
    pub remaining: u64,
}

fn parse_local(value: &str, key: &str) -> Result<i64> {
    let naive = NaiveDateTime::parse_from_str(value, LOCAL_DATE_TIME_FORMAT).map_err(|e| {
        Error::config(
            format!("expected {LOCAL_DATE_TIME_FORMAT}, got {value:?}: {e}"),
            key,
        )
    })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp())
        .ok_or_else(|| Error::config(format!("{value:?} does not exist in local time"), key))
}

fn format_api(seconds: i64) -> String {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .map(|dt| dt.format(API_DATE_TIME_FORMAT).to_string())
        .unwrap_or_else(|| seconds.to_string())
}
