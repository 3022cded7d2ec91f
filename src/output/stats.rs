//! Batch statistics
//!
//! Folds the per-extension results of one batch into counts and the id lists
//! an operator needs for follow-up work.

use crate::crawler::UpdateResult;
use crate::state::ExtensionId;

/// Summary of one batch of extension updates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Number of results in the batch
    pub processed: usize,

    /// Archives created by this batch
    pub new: usize,

    pub ok: usize,
    pub not_modified: usize,
    pub not_authorized: usize,
    pub not_in_store: usize,
    pub has_exception: usize,
    pub rate_limited: usize,

    /// Results with at least one archive lifecycle failure
    pub archive_failed: usize,

    /// Archives quarantined as corrupt
    pub corrupt: usize,

    /// Ids the store no longer lists
    pub delisted: Vec<ExtensionId>,

    /// Ids whose update should be queued again
    pub rerun: Vec<ExtensionId>,
}

impl BatchSummary {
    pub fn from_results(results: &[UpdateResult]) -> Self {
        let count = |predicate: fn(&UpdateResult) -> bool| {
            results.iter().filter(|r| predicate(r)).count()
        };
        let collect = |predicate: fn(&UpdateResult) -> bool| {
            let mut ids: Vec<ExtensionId> = results
                .iter()
                .filter(|r| predicate(r))
                .map(|r| r.id.clone())
                .collect();
            ids.sort();
            ids
        };

        Self {
            processed: results.len(),
            new: count(UpdateResult::is_new),
            ok: count(UpdateResult::is_ok),
            not_modified: count(UpdateResult::not_modified),
            not_authorized: count(UpdateResult::not_authorized),
            not_in_store: count(UpdateResult::not_in_store),
            has_exception: count(UpdateResult::has_exception),
            rate_limited: count(UpdateResult::rate_limited),
            archive_failed: count(UpdateResult::archive_failed),
            corrupt: count(UpdateResult::corrupt_archive),
            delisted: collect(UpdateResult::not_in_store),
            rerun: collect(UpdateResult::needs_rerun),
        }
    }

    /// True if every update completed without a recorded problem
    pub fn is_clean(&self) -> bool {
        self.ok == self.processed && self.archive_failed == 0
    }
}

/// Prints a batch summary to stdout
pub fn print_summary(summary: &BatchSummary) {
    println!("=== Batch Summary ===\n");

    println!("Overview:");
    println!("  Extensions processed: {}", summary.processed);
    println!("  New archives: {}", summary.new);
    println!(
        "  Updated successfully: {} ({:.1}%)",
        summary.ok,
        percentage(summary.ok, summary.processed)
    );
    println!("  Package not modified: {}", summary.not_modified);
    println!();

    println!("Problems:");
    println!("  Not authorized: {}", summary.not_authorized);
    println!("  Not in store: {}", summary.not_in_store);
    println!("  Request exceptions: {}", summary.has_exception);
    println!("  Rate limited forums: {}", summary.rate_limited);
    println!("  Archive failures: {}", summary.archive_failed);
    println!("  Corrupt archives quarantined: {}", summary.corrupt);
    println!();

    if !summary.delisted.is_empty() {
        println!("Delisted ({}):", summary.delisted.len());
        for id in &summary.delisted {
            println!("  - {}", id);
        }
        println!();
    }

    if !summary.rerun.is_empty() {
        println!("Needs rerun ({}):", summary.rerun.len());
        for id in &summary.rerun {
            println!("  - {}", id);
        }
        println!();
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}
