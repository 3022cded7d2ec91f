//! On-disk naming for one extension's archive
//!
//! ```text
//! <root>/<shard>/<id>.tar                  current archive
//! <root>/<shard>/<id>.bak.tar              previous archive (safety copy)
//! <root>/<shard>/<id>.corrupt.<run>.tar    quarantined archive
//! <root>/<shard>/<id>.tar.tmp              repack in progress
//! <root>/<shard>/<id>/<run>/<artifact>     scratch directory while updating
//! ```

use crate::state::{CrawlRun, ExtensionId};
use std::path::{Path, PathBuf};

/// All paths touched by one extension's update
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    id: ExtensionId,
    shard_dir: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: &Path, id: &ExtensionId) -> Self {
        Self {
            id: id.clone(),
            shard_dir: root.join(id.shard()),
        }
    }

    pub fn id(&self) -> &ExtensionId {
        &self.id
    }

    pub fn shard_dir(&self) -> &Path {
        &self.shard_dir
    }

    pub fn tar_path(&self) -> PathBuf {
        self.shard_dir.join(format!("{}.tar", self.id))
    }

    pub fn backup_path(&self) -> PathBuf {
        self.shard_dir.join(format!("{}.bak.tar", self.id))
    }

    pub fn corrupt_path(&self, run: &CrawlRun) -> PathBuf {
        self.shard_dir
            .join(format!("{}.corrupt.{}.tar", self.id, run))
    }

    pub fn temp_path(&self) -> PathBuf {
        self.shard_dir.join(format!("{}.tar.tmp", self.id))
    }

    /// Directory the archive is unpacked into; its name is the tar prefix
    pub fn scratch_dir(&self) -> PathBuf {
        self.shard_dir.join(self.id.as_str())
    }

    pub fn run_dir(&self, run: &CrawlRun) -> PathBuf {
        self.scratch_dir().join(run.to_string())
    }
}
