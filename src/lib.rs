//! Extension Archiver: a longitudinal archive of browser-extension store listings
//!
//! Every crawl run fetches, per extension, the store listing page, the
//! installable package and (for a selected group) the review and support
//! forums, and appends them as a timestamped snapshot to a per-extension tar
//! archive. Failures are recorded next to the artifacts they concern; one
//! extension never aborts the batch.

pub mod archive;
pub mod config;
pub mod crawler;
pub mod discover;
pub mod output;
pub mod state;

use thiserror::Error;

/// Main error type for archiver operations
///
/// Only batch setup (configuration, HTTP client, discovery) surfaces these;
/// per-extension failures are recorded in `UpdateResult` instead.
#[derive(Debug, Error)]
pub enum ArchiverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Identifier error: {0}")]
    Id(#[from] IdError),

    #[error("Discovery failed: {0}")]
    Discovery(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Identifier parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("Invalid extension id: {0:?}")]
    InvalidExtensionId(String),

    #[error("Invalid crawl run timestamp: {0:?}")]
    InvalidCrawlRun(String),
}

/// Result type alias for archiver operations
pub type Result<T> = std::result::Result<T, ArchiverError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use archive::{ArchiveFailure, ArchiveStore};
pub use config::Config;
pub use crawler::{update_batch, FetchOutcome, UpdateResult};
pub use state::{CrawlRun, ExtensionId, UpdateState};
