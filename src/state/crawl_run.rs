//! Crawl run timestamps
//!
//! A run is rendered as `YYYY-MM-DDTHH:MM:SSZ`. The fixed-width format makes
//! lexicographic order identical to chronological order, which the archive
//! relies on when looking up the most recent package.

use crate::IdError;
use chrono::{DateTime, SubsecRound, Utc};
use std::fmt;

const RUN_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// The UTC second at which one extension update started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrawlRun(DateTime<Utc>);

impl CrawlRun {
    /// Creates a run for the current instant
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    /// Creates a run from a timestamp, dropping sub-second precision
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0))
    }

    /// Parses a run directory name back into a run
    ///
    /// Any RFC 3339 timestamp is accepted so archives written with an
    /// explicit `+00:00` offset or fractional seconds still resolve.
    pub fn parse(raw: &str) -> Result<Self, IdError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| Self::new(dt.with_timezone(&Utc)))
            .map_err(|_| IdError::InvalidCrawlRun(raw.to_string()))
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.0
    }

    /// The run one second later
    pub fn next_second(&self) -> Self {
        Self(self.0 + chrono::Duration::seconds(1))
    }

    /// Formats the run as an HTTP date for `If-Modified-Since`
    pub fn http_date(&self) -> String {
        self.0.format(HTTP_DATE_FORMAT).to_string()
    }
}

impl fmt::Display for CrawlRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(RUN_FORMAT))
    }
}
