//! Fetch outcomes and per-extension update results
//!
//! Each network interaction is classified into a `FetchOutcome`. The (up to
//! four) outcomes of one update and its archive failures are folded into an
//! `UpdateResult`, whose predicates are pure functions of those values.

use crate::archive::{ArchiveFailure, ArchiveUpdate};
use crate::state::{CrawlRun, ExtensionId};
use reqwest::StatusCode;
use std::fmt;

/// Classification of one network interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// HTTP 200
    Ok,
    /// HTTP 304 on a conditional package request
    NotModified,
    /// HTTP 401, the listing is account-gated
    Unauthorized,
    /// HTTP 404, the listing is gone from the store
    NotFound,
    /// HTTP 503, upstream throttling
    RateLimited,
    /// Any other HTTP status
    OtherStatus(u16),
    /// Timeout, connection or body transfer failure
    TransientError(String),
    /// The package response failed content validation
    Rejected(String),
    /// The response arrived but could not be staged on disk
    WriteError(String),
}

impl FetchOutcome {
    pub fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::OK => Self::Ok,
            StatusCode::NOT_MODIFIED => Self::NotModified,
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::NOT_FOUND => Self::NotFound,
            StatusCode::SERVICE_UNAVAILABLE => Self::RateLimited,
            other => Self::OtherStatus(other.as_u16()),
        }
    }

    pub fn from_transport(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::TransientError(format!("Request timeout: {}", error))
        } else if error.is_connect() {
            Self::TransientError(format!("Connection failed: {}", error))
        } else {
            Self::TransientError(error.to_string())
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    pub fn not_modified(&self) -> bool {
        matches!(self, Self::NotModified)
    }

    pub fn not_authorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub fn not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    /// Returns true if no HTTP status could be attributed to the interaction
    pub fn has_exception(&self) -> bool {
        matches!(
            self,
            Self::TransientError(_) | Self::Rejected(_) | Self::WriteError(_)
        )
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("200"),
            Self::NotModified => f.write_str("304"),
            Self::Unauthorized => f.write_str("401"),
            Self::NotFound => f.write_str("404"),
            Self::RateLimited => f.write_str("503"),
            Self::OtherStatus(code) => write!(f, "{}", code),
            Self::TransientError(e) => write!(f, "error: {}", e),
            Self::Rejected(e) => write!(f, "rejected: {}", e),
            Self::WriteError(e) => write!(f, "write error: {}", e),
        }
    }
}

/// The outcomes gathered while one run's snapshot was being produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub overview: FetchOutcome,
    pub package: FetchOutcome,
    /// Only present for extensions on the forum roster
    pub reviews: Option<FetchOutcome>,
    /// Only present for extensions on the forum roster
    pub support: Option<FetchOutcome>,
}

impl FetchReport {
    fn outcomes(&self) -> impl Iterator<Item = &FetchOutcome> {
        [Some(&self.overview), Some(&self.package)]
            .into_iter()
            .chain([self.reviews.as_ref(), self.support.as_ref()])
            .flatten()
    }
}

/// Summary of one extension update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateResult {
    pub id: ExtensionId,
    pub run: CrawlRun,
    /// True if this update created the archive
    pub new: bool,
    pub fetches: FetchReport,
    pub archive_failures: Vec<ArchiveFailure>,
}

impl UpdateResult {
    /// Folds an archive update that produced a fetch report into a result
    pub fn from_update(id: ExtensionId, update: ArchiveUpdate<FetchReport>) -> Self {
        Self {
            id,
            run: update.run,
            new: update.is_new,
            fetches: update.output,
            archive_failures: update.failures,
        }
    }

    /// Result for an update whose task never finished
    pub fn aborted(id: ExtensionId, run: CrawlRun, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            id,
            run,
            new: false,
            fetches: FetchReport {
                overview: FetchOutcome::TransientError(message.clone()),
                package: FetchOutcome::TransientError(message.clone()),
                reviews: None,
                support: None,
            },
            archive_failures: vec![ArchiveFailure::Task { message }],
        }
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    /// Overview fetched, package fetched or unchanged, forum pages fetched
    pub fn is_ok(&self) -> bool {
        let f = &self.fetches;
        f.overview.is_ok()
            && (f.package.is_ok() || f.package.not_modified())
            && f.reviews.as_ref().map_or(true, FetchOutcome::is_ok)
            && f.support.as_ref().map_or(true, FetchOutcome::is_ok)
    }

    pub fn not_authorized(&self) -> bool {
        self.fetches.outcomes().any(FetchOutcome::not_authorized)
    }

    pub fn not_in_store(&self) -> bool {
        self.fetches.outcomes().any(FetchOutcome::not_found)
    }

    pub fn has_exception(&self) -> bool {
        self.fetches.outcomes().any(FetchOutcome::has_exception)
    }

    /// True if the throttled forum endpoints answered 503
    pub fn rate_limited(&self) -> bool {
        [self.fetches.reviews.as_ref(), self.fetches.support.as_ref()]
            .into_iter()
            .flatten()
            .any(FetchOutcome::rate_limited)
    }

    pub fn not_modified(&self) -> bool {
        self.fetches.package.not_modified()
    }

    /// True if any archive lifecycle step failed
    pub fn archive_failed(&self) -> bool {
        !self.archive_failures.is_empty()
    }

    /// True if the previous archive was quarantined during this update
    pub fn corrupt_archive(&self) -> bool {
        self.archive_failures.iter().any(ArchiveFailure::is_corrupt)
    }

    /// True if the id should be scheduled again soon
    ///
    /// Any archive failure other than a quarantine counts: the next update
    /// is what restores a backup or retries a failed repack.
    pub fn needs_rerun(&self) -> bool {
        self.has_exception() || self.archive_failures.iter().any(|f| !f.is_corrupt())
    }
}
