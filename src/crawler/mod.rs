//! Crawler module for fetching and archiving extension listings
//!
//! This module contains the per-run update logic, including:
//! - HTTP retrieval of listing, package and forum pages
//! - Classification of every retrieval into a `FetchOutcome`
//! - The per-extension pipeline feeding the archive store
//! - Batch scheduling across a worker pool

mod fetcher;
mod pacing;
mod pipeline;
mod result;
mod scheduler;

pub use fetcher::{
    build_http_client, is_valid_package_name, resolved_file_name, validate_package_response,
    Fetcher, ForumKind, ValidationError, DEFAULT_PACKAGE_NAME, FORUM_PAGE_OFFSETS,
    FORUM_PAGE_SIZE, PACKAGE_CONTENT_TYPE,
};
pub use pacing::Pacing;
pub use pipeline::{update_extension, CrawlContext};
pub use result::{FetchOutcome, FetchReport, UpdateResult};
pub use scheduler::{BatchPlan, Scheduler};

use crate::config::Config;
use crate::state::ExtensionId;
use crate::ArchiverError;
use std::sync::Arc;

/// Updates one batch of extensions
///
/// This is the main entry point for a crawl. It will:
/// 1. Build the HTTP client and archive store from `config`
/// 2. Update `forum_ids ∩ full_ids` sequentially, with forum pages
/// 3. Update the rest of `full_ids` on `parallel-workers` workers
///
/// # Returns
///
/// * `Ok(Vec<UpdateResult>)` - One result per distinct id, forum group first
/// * `Err(ArchiverError)` - The HTTP client could not be built
///
/// # Example
///
/// ```no_run
/// use extension_archiver::config::load_config;
/// use extension_archiver::crawler::update_batch;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("archiver.toml"))?;
/// let results = update_batch(&config, &[], &[]).await?;
/// assert!(results.is_empty());
/// # Ok(())
/// # }
/// ```
pub async fn update_batch(
    config: &Config,
    full_ids: &[ExtensionId],
    forum_ids: &[ExtensionId],
) -> Result<Vec<UpdateResult>, ArchiverError> {
    let context = Arc::new(CrawlContext::from_config(config)?);
    let scheduler = Scheduler::new(context, config.crawler.parallel_workers as usize);
    Ok(scheduler.update_batch(full_ids, forum_ids).await)
}
