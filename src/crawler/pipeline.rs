//! Per-extension update pipeline
//!
//! One update fetches the overview page and the package (and, for forum
//! extensions, reviews and support pages) into a fresh snapshot, then lets
//! the archive store fold that snapshot into the extension's tar.

use crate::archive::ArchiveStore;
use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::result::{FetchReport, UpdateResult};
use crate::state::{CrawlRun, ExtensionId, UpdateState};
use crate::ArchiverError;

/// Everything a worker needs to update an extension
#[derive(Debug, Clone)]
pub struct CrawlContext {
    pub fetcher: Fetcher,
    pub store: ArchiveStore,
}

impl CrawlContext {
    pub fn new(fetcher: Fetcher, store: ArchiveStore) -> Self {
        Self { fetcher, store }
    }

    pub fn from_config(config: &Config) -> Result<Self, ArchiverError> {
        let fetcher = Fetcher::from_config(config)?;
        Ok(Self::new(fetcher, ArchiveStore::new(&config.archive.root)))
    }
}

/// Tracks and logs the lifecycle of one update
struct Progress<'a> {
    id: &'a ExtensionId,
    state: UpdateState,
}

impl Progress<'_> {
    /// Moves to `next`; a finished update stays finished
    fn advance(&mut self, next: UpdateState) {
        if self.state.is_terminal() {
            tracing::warn!("{}: update already {}, ignoring {}", self.id, self.state, next);
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::warn!("{}: unexpected transition {} -> {}", self.id, self.state, next);
        }
        tracing::trace!("{}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }
}

/// Updates a single extension and reports what happened
///
/// Never fails: every network and archive failure is recorded on the
/// returned result.
pub async fn update_extension(
    context: &CrawlContext,
    id: &ExtensionId,
    run: CrawlRun,
    with_forums: bool,
) -> UpdateResult {
    let fetcher = &context.fetcher;
    let store = &context.store;

    let mut progress = Progress {
        id,
        state: UpdateState::initial(store.exists(id)),
    };
    tracing::debug!(
        "Updating {} ({}){}",
        id,
        progress.state,
        if with_forums { " including forums" } else { "" }
    );

    let tracker = &mut progress;
    let update = store
        .update(id, &run, |writer| async move {
            tracker.advance(UpdateState::Fetching);

            let overview = fetcher.fetch_overview(id, &writer).await;
            let previous = store.last_package(id).await;
            let package = fetcher.fetch_package(id, &writer, previous.as_ref()).await;

            let (reviews, support) = if with_forums {
                let reviews = fetcher.fetch_reviews(id, &writer).await;
                let support = fetcher.fetch_support(id, &writer).await;
                (Some(reviews), Some(support))
            } else {
                (None, None)
            };

            tracker.advance(UpdateState::Archiving);
            FetchReport {
                overview,
                package,
                reviews,
                support,
            }
        })
        .await;
    progress.advance(UpdateState::Done);

    let result = UpdateResult::from_update(id.clone(), update);
    log_result(&result);
    result
}

fn log_result(result: &UpdateResult) {
    let fetches = &result.fetches;
    let forums = match (&fetches.reviews, &fetches.support) {
        (Some(reviews), Some(support)) => format!(", reviews {}, support {}", reviews, support),
        _ => String::new(),
    };

    if result.archive_failed() {
        for failure in &result.archive_failures {
            if failure.leaves_no_archive() {
                tracing::error!("{}: {}", result.id, failure);
            } else {
                tracing::warn!("{}: {}", result.id, failure);
            }
        }
    }

    if result.is_ok() && !result.archive_failed() {
        tracing::info!(
            "{}: overview {}, package {}{}{}",
            result.id,
            fetches.overview,
            fetches.package,
            forums,
            if result.is_new() { " (new)" } else { "" }
        );
    } else {
        tracing::warn!(
            "{}: overview {}, package {}{}",
            result.id,
            fetches.overview,
            fetches.package,
            forums
        );
    }
}
