//! Batch scheduling
//!
//! This module handles:
//! - Partitioning a batch into forum and non-forum extensions
//! - Updating forum extensions one at a time on the coordinator
//! - Draining non-forum extensions through a fixed-width worker pool
//! - Isolating every extension update in its own task

use crate::crawler::pipeline::{update_extension, CrawlContext};
use crate::crawler::result::UpdateResult;
use crate::state::{CrawlRun, ExtensionId};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// The two disjoint groups of one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchPlan {
    /// Extensions whose forums are scraped; updated sequentially
    pub forum: Vec<ExtensionId>,

    /// Everything else; updated in parallel
    pub parallel: Vec<ExtensionId>,
}

impl BatchPlan {
    /// Splits `full_ids` into `forum_ids ∩ full_ids` and the remainder
    ///
    /// Both inputs may contain duplicates; forum ids missing from
    /// `full_ids` are ignored. Each group is sorted.
    pub fn partition(full_ids: &[ExtensionId], forum_ids: &[ExtensionId]) -> Self {
        let full: BTreeSet<&ExtensionId> = full_ids.iter().collect();
        let roster: BTreeSet<&ExtensionId> = forum_ids.iter().collect();

        let (forum, parallel): (Vec<&ExtensionId>, Vec<&ExtensionId>) =
            full.into_iter().partition(|id| roster.contains(id));

        Self {
            forum: forum.into_iter().cloned().collect(),
            parallel: parallel.into_iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.forum.len() + self.parallel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drives the per-extension updates of one batch
pub struct Scheduler {
    context: Arc<CrawlContext>,
    workers: usize,
}

impl Scheduler {
    /// Creates a scheduler with a worker pool of the given width (at least 1)
    pub fn new(context: Arc<CrawlContext>, workers: usize) -> Self {
        Self {
            context,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Updates every id in `full_ids` exactly once
    ///
    /// Results of the forum group come first. Within the parallel group the
    /// order is completion order and carries no meaning.
    pub async fn update_batch(
        &self,
        full_ids: &[ExtensionId],
        forum_ids: &[ExtensionId],
    ) -> Vec<UpdateResult> {
        let plan = BatchPlan::partition(full_ids, forum_ids);
        tracing::info!(
            "Updating {} extensions ({} including forums)",
            plan.len(),
            plan.forum.len()
        );

        let mut results = self.run_sequential(&plan.forum).await;
        results.extend(self.run_parallel(plan.parallel).await);
        results
    }

    /// Updates forum extensions one after another
    async fn run_sequential(&self, ids: &[ExtensionId]) -> Vec<UpdateResult> {
        tracing::info!(
            "Updating {} extensions including forums (sequentially)",
            ids.len()
        );

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push(run_isolated(self.context.clone(), id.clone(), true).await);
        }
        results
    }

    /// Feeds ids through a bounded queue drained by a fixed set of workers
    async fn run_parallel(&self, ids: Vec<ExtensionId>) -> Vec<UpdateResult> {
        tracing::info!(
            "Updating {} extensions excluding forums (parallel, {} workers)",
            ids.len(),
            self.workers
        );

        let total = ids.len();
        let (sender, receiver) = mpsc::channel::<ExtensionId>(self.workers * 2);
        let receiver = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(self.workers);
        for worker in 0..self.workers {
            let receiver = receiver.clone();
            let context = self.context.clone();
            handles.push(tokio::spawn(async move {
                let mut results = Vec::new();
                loop {
                    let next = receiver.lock().await.recv().await;
                    let Some(id) = next else {
                        break;
                    };
                    results.push(run_isolated(context.clone(), id, false).await);
                }
                tracing::trace!("Worker {} finished after {} updates", worker, results.len());
                results
            }));
        }

        for id in ids {
            if sender.send(id).await.is_err() {
                tracing::error!("All workers stopped before the queue was drained");
                break;
            }
        }
        drop(sender);

        let mut results = Vec::with_capacity(total);
        for handle in handles {
            match handle.await {
                Ok(worker_results) => results.extend(worker_results),
                Err(e) => tracing::error!("Worker task failed: {}", e),
            }
        }
        results
    }
}

/// Runs one extension update in its own task
///
/// A panic inside the update is converted into an aborted result, so one
/// extension can never take down its worker or the batch.
async fn run_isolated(
    context: Arc<CrawlContext>,
    id: ExtensionId,
    with_forums: bool,
) -> UpdateResult {
    let run = CrawlRun::now();
    let task_id = id.clone();
    let handle = tokio::spawn(async move {
        update_extension(&context, &task_id, run, with_forums).await
    });

    match handle.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Update of {} did not complete: {}", id, e);
            UpdateResult::aborted(id, run, e.to_string())
        }
    }
}
