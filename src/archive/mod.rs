//! Durable per-extension archives
//!
//! Every extension owns one tar at `<root>/<shard>/<id>.tar` holding all of
//! its snapshots as `<id>/<run>/<artifact>`. This module provides:
//! - `ArchiveLayout`: the paths belonging to one id
//! - `SnapshotWriter`: staging of one run's artifacts and sidecars
//! - `ArchiveStore`: the extract-append-repack lifecycle

mod layout;
mod snapshot;
mod store;

pub use layout::ArchiveLayout;
pub use snapshot::SnapshotWriter;
pub use store::{ArchiveStore, ArchiveUpdate};

use crate::state::CrawlRun;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// File extension of archived packages
pub const PACKAGE_EXTENSION: &str = ".crx";

/// A lifecycle step that failed during an archive update
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArchiveFailure {
    #[error("Archive could not be extracted, quarantined as {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Cannot restore backup {path}: {message}")]
    Restore { path: PathBuf, message: String },

    #[error("Cannot move {path} to backup: {message}")]
    BackupRename { path: PathBuf, message: String },

    #[error("Cannot create archive {path}: {message}")]
    Repack { path: PathBuf, message: String },

    #[error("Cannot remove scratch directory {path}: {message}")]
    ScratchCleanup { path: PathBuf, message: String },

    #[error("Update task did not complete: {message}")]
    Task { message: String },
}

impl ArchiveFailure {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    /// Returns true if this failure may have left the id without a current tar
    pub fn leaves_no_archive(&self) -> bool {
        matches!(
            self,
            Self::Restore { .. } | Self::Repack { .. } | Self::Task { .. }
        )
    }
}

/// A package stored by an earlier run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    /// The run that downloaded the package
    pub run: CrawlRun,

    /// The run directory name exactly as it appears in the archive
    pub run_dir: String,

    /// The package file name, e.g. `extension_1_2_3.crx`
    pub file_name: String,
}

impl PackageRef {
    /// Recognises `<id>/<run>/<name>.crx` tar entry paths
    pub fn from_entry_path(path: &Path) -> Option<Self> {
        let parts: Vec<&str> = path
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();

        let [_, run_dir, file_name] = parts.as_slice() else {
            return None;
        };
        if !file_name.ends_with(PACKAGE_EXTENSION) {
            return None;
        }

        let run = CrawlRun::parse(run_dir).ok()?;
        Some(Self {
            run,
            run_dir: run_dir.to_string(),
            file_name: file_name.to_string(),
        })
    }

    /// Path of the package relative to another run's directory
    pub fn link_target(&self) -> String {
        format!("../{}/{}", self.run_dir, self.file_name)
    }
}
