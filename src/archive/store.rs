//! Archive lifecycle: extract, append, repack
//!
//! Each update unpacks the current tar into a scratch directory, lets the
//! fetch pipeline add one run directory, and packs everything back into a
//! fresh tar. No step raises: failures are collected on the returned
//! `ArchiveUpdate` so the caller can flag the id for a re-run.
//!
//! Tar reading and writing is blocking and runs on the blocking pool.

use crate::archive::layout::ArchiveLayout;
use crate::archive::snapshot::SnapshotWriter;
use crate::archive::{ArchiveFailure, PackageRef};
use crate::state::{CrawlRun, ExtensionId};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Outcome of one archive update
#[derive(Debug)]
pub struct ArchiveUpdate<T> {
    /// The run directory the snapshot was recorded under
    pub run: CrawlRun,

    /// True if no archive existed before this update
    pub is_new: bool,

    /// Every lifecycle step that failed, in order
    pub failures: Vec<ArchiveFailure>,

    /// Whatever the producer returned
    pub output: T,
}

/// Owns the sharded tar files under one archive root
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self, id: &ExtensionId) -> ArchiveLayout {
        ArchiveLayout::new(&self.root, id)
    }

    /// Returns true if `id` has an archive, current or left behind as backup
    pub fn exists(&self, id: &ExtensionId) -> bool {
        let layout = self.layout(id);
        layout.tar_path().is_file() || layout.backup_path().is_file()
    }

    /// Finds the most recently archived package of `id`
    ///
    /// Scans the current tar for `<id>/<run>/<name>.crx` entries and returns
    /// the lexicographically last one. An unreadable archive yields `None`;
    /// the update lifecycle is responsible for quarantining it.
    pub async fn last_package(&self, id: &ExtensionId) -> Option<PackageRef> {
        let tar_path = self.layout(id).tar_path();
        if !tar_path.is_file() {
            return None;
        }

        match run_blocking(move || find_last_package(&tar_path)).await {
            Ok(found) => found,
            Err(message) => {
                tracing::warn!("Cannot scan archive of {} for packages: {}", id, message);
                None
            }
        }
    }

    /// Runs one extract-append-repack cycle for `id`
    ///
    /// 1. If only `<id>.bak.tar` exists, move it back to `<id>.tar`.
    /// 2. Unpack the current tar into the scratch directory. If that fails,
    ///    quarantine the tar as `<id>.corrupt.<run>.tar` and continue empty.
    /// 3. Call `producer` with a writer for `<scratch>/<run>/`. A run
    ///    directory that already exists is never reused; the run moves
    ///    forward one second at a time until it names a fresh directory.
    /// 4. If a current tar exists, drop any stale backup and move the
    ///    current tar to `<id>.bak.tar`.
    /// 5. Pack the scratch directory into `<id>.tar.tmp`, sync it, and
    ///    rename it to `<id>.tar`.
    /// 6. Remove the scratch directory.
    ///
    /// A failure in step 5 leaves no current tar; it is reported as
    /// `ArchiveFailure::Repack` and the backup is the only copy until step 1
    /// of the next update restores it.
    pub async fn update<F, Fut, T>(
        &self,
        id: &ExtensionId,
        run: &CrawlRun,
        producer: F,
    ) -> ArchiveUpdate<T>
    where
        F: FnOnce(SnapshotWriter) -> Fut,
        Fut: Future<Output = T>,
    {
        let layout = self.layout(id);
        let tar_path = layout.tar_path();
        let scratch = layout.scratch_dir();
        let mut failures = Vec::new();

        // Leftovers from an interrupted update must not leak into this one
        if let Err(e) = remove_dir_if_present(&scratch).await {
            tracing::warn!("Cannot clear stale scratch {}: {}", scratch.display(), e);
        }

        if let Err(failure) = restore_backup(&layout).await {
            tracing::error!("{}", failure);
            failures.push(failure);
        }

        let is_new = !tar_path.is_file() && !layout.backup_path().is_file();
        let quarantined = if tar_path.is_file() {
            self.extract(&layout, run).await.err()
        } else {
            None
        };

        let snapshot_run = unused_run(&layout, *run);
        if snapshot_run != *run {
            tracing::warn!(
                "Run {} of {} is already archived, recording as {}",
                run,
                id,
                snapshot_run
            );
        }
        let writer = SnapshotWriter::new(layout.run_dir(&snapshot_run));

        if let Some(failure) = quarantined {
            let sidecar = format!("{}.corrupt.{}", id, run);
            if let Err(e) = writer.write_exception(&sidecar, &failure).await {
                tracing::warn!("Cannot record quarantine of {}: {}", id, e);
            }
            failures.push(failure);
        }

        if let Err(e) = fs::create_dir_all(&scratch).await {
            tracing::warn!("Cannot create scratch {}: {}", scratch.display(), e);
        }

        let output = producer(writer.clone()).await;

        if tar_path.is_file() {
            // A leftover backup is overwritten by the rename below anyway
            match fs::remove_file(layout.backup_path()).await {
                Ok(()) => tracing::debug!("Rotated stale backup of {}", id),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::debug!("Ignoring backup rotation failure for {}: {}", id, e),
            }

            if let Err(e) = fs::rename(&tar_path, layout.backup_path()).await {
                let failure = ArchiveFailure::BackupRename {
                    path: tar_path.clone(),
                    message: e.to_string(),
                };
                tracing::warn!("{}", failure);
                if let Err(e) = writer
                    .write_exception(&format!("{}.tar.rename", id), &failure)
                    .await
                {
                    tracing::warn!("Cannot record backup failure of {}: {}", id, e);
                }
                failures.push(failure);
            }
        }

        if let Err(failure) = self.repack(&layout).await {
            tracing::error!("{}", failure);
            failures.push(failure);
        }

        if let Err(e) = remove_dir_if_present(&scratch).await {
            let failure = ArchiveFailure::ScratchCleanup {
                path: scratch,
                message: e.to_string(),
            };
            tracing::warn!("{}", failure);
            failures.push(failure);
        }

        ArchiveUpdate {
            run: snapshot_run,
            is_new,
            failures,
            output,
        }
    }

    /// Unpacks the current tar, quarantining it if unpacking fails
    async fn extract(&self, layout: &ArchiveLayout, run: &CrawlRun) -> Result<(), ArchiveFailure> {
        let tar_path = layout.tar_path();
        let shard_dir = layout.shard_dir().to_path_buf();

        let source = tar_path.clone();
        let message = match run_blocking(move || unpack(&source, &shard_dir)).await {
            Ok(()) => {
                tracing::debug!("Extracted {}", tar_path.display());
                return Ok(());
            }
            Err(message) => message,
        };

        let scratch = layout.scratch_dir();
        if let Err(e) = remove_dir_if_present(&scratch).await {
            tracing::warn!("Cannot clear partial extraction {}: {}", scratch.display(), e);
        }

        let corrupt = layout.corrupt_path(run);
        if let Err(e) = fs::rename(&tar_path, &corrupt).await {
            tracing::warn!("Cannot quarantine {}: {}", tar_path.display(), e);
        }

        let failure = ArchiveFailure::Corrupt {
            path: corrupt,
            message,
        };
        tracing::warn!("{}", failure);
        Err(failure)
    }

    /// Packs the scratch directory into a fresh current tar
    async fn repack(&self, layout: &ArchiveLayout) -> Result<(), ArchiveFailure> {
        let scratch = layout.scratch_dir();
        let temp = layout.temp_path();
        let dest = layout.tar_path();
        let prefix = layout.id().to_string();

        let (temp_clone, dest_clone) = (temp.clone(), dest.clone());
        match run_blocking(move || pack(&scratch, &prefix, &temp_clone, &dest_clone)).await {
            Ok(()) => {
                tracing::debug!("Repacked {}", dest.display());
                Ok(())
            }
            Err(message) => {
                let _ = fs::remove_file(&temp).await;
                Err(ArchiveFailure::Repack {
                    path: dest,
                    message,
                })
            }
        }
    }
}

/// Runs blocking archive work off the async workers
async fn run_blocking<R, F>(work: F) -> Result<R, String>
where
    F: FnOnce() -> io::Result<R> + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("archive task failed: {}", e)),
    }
}

/// Moves a backup left by a failed repack back into place
async fn restore_backup(layout: &ArchiveLayout) -> Result<(), ArchiveFailure> {
    let tar_path = layout.tar_path();
    let backup = layout.backup_path();
    if tar_path.is_file() || !backup.is_file() {
        return Ok(());
    }

    match fs::rename(&backup, &tar_path).await {
        Ok(()) => {
            tracing::warn!("Restored {} from {}", tar_path.display(), backup.display());
            Ok(())
        }
        Err(e) => Err(ArchiveFailure::Restore {
            path: backup,
            message: e.to_string(),
        }),
    }
}

/// First run at or after `run` whose scratch directory does not exist yet
fn unused_run(layout: &ArchiveLayout, run: CrawlRun) -> CrawlRun {
    let mut candidate = run;
    while layout.run_dir(&candidate).exists() {
        candidate = candidate.next_second();
    }
    candidate
}

async fn remove_dir_if_present(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn unpack(tar_path: &Path, into: &Path) -> io::Result<()> {
    let file = std::fs::File::open(tar_path)?;
    tar::Archive::new(file).unpack(into)
}

fn pack(scratch: &Path, prefix: &str, temp: &Path, dest: &Path) -> io::Result<()> {
    let file = std::fs::File::create(temp)?;
    let mut builder = tar::Builder::new(file);
    builder.follow_symlinks(false);
    builder.append_dir_all(prefix, scratch)?;

    let file = builder.into_inner()?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(temp, dest)
}

fn find_last_package(tar_path: &Path) -> io::Result<Option<PackageRef>> {
    let file = std::fs::File::open(tar_path)?;
    let mut archive = tar::Archive::new(file);

    let mut last: Option<(PathBuf, PackageRef)> = None;
    for entry in archive.entries()? {
        let entry = entry?;
        let path = entry.path()?.into_owned();
        let Some(package) = PackageRef::from_entry_path(&path) else {
            continue;
        };
        if last.as_ref().map_or(true, |(seen, _)| path > *seen) {
            last = Some((path, package));
        }
    }

    Ok(last.map(|(_, package)| package))
}
