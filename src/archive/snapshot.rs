//! Snapshot staging
//!
//! A `SnapshotWriter` owns the `<scratch>/<run>/` directory of one update.
//! Every artifact it writes is folded into the tar when the archive is
//! repacked, so nothing here is ever rewritten or deleted by later runs.

use reqwest::Response;
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Writes one run's artifacts and their diagnostic sidecars
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Creates a writer for `run_dir`; the directory is created on first write
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: run_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, artifact: &str) -> PathBuf {
        self.dir.join(artifact)
    }

    async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Writes a complete artifact
    pub async fn write(&self, artifact: &str, payload: impl AsRef<[u8]>) -> io::Result<()> {
        self.ensure_dir().await?;
        fs::write(self.path_of(artifact), payload).await
    }

    /// Opens an artifact for streaming writes
    pub async fn create(&self, artifact: &str) -> io::Result<File> {
        self.ensure_dir().await?;
        File::create(self.path_of(artifact)).await
    }

    /// Removes a partially written artifact; a missing file is not an error
    pub async fn discard(&self, artifact: &str) -> io::Result<()> {
        match fs::remove_file(self.path_of(artifact)).await {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Writes the `.headers`, `.status` and `.url` sidecars of a response
    pub async fn write_response_metadata(
        &self,
        artifact: &str,
        response: &Response,
    ) -> io::Result<()> {
        let mut headers = String::new();
        for (name, value) in response.headers() {
            headers.push_str(name.as_str());
            headers.push_str(": ");
            headers.push_str(&String::from_utf8_lossy(value.as_bytes()));
            headers.push('\n');
        }

        self.write(&format!("{}.headers", artifact), headers).await?;
        self.write(
            &format!("{}.status", artifact),
            response.status().as_u16().to_string(),
        )
        .await?;
        self.write(&format!("{}.url", artifact), response.url().as_str())
            .await
    }

    /// Writes the `.exception` sidecar that stands in for a failed artifact
    pub async fn write_exception(
        &self,
        artifact: &str,
        error: &(dyn Display + Sync),
    ) -> io::Result<()> {
        self.write(&format!("{}.exception", artifact), error.to_string())
            .await
    }

    /// Writes a `.link` sidecar holding a path relative to this run's directory
    pub async fn write_link(&self, artifact: &str, target: &str) -> io::Result<()> {
        let mut file = self.create(&format!("{}.link", artifact)).await?;
        file.write_all(target.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}
