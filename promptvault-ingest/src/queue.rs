//! Directory queue of `*.jsonl` hook files
//!
//! Layout under the queue root:
//! - `*.jsonl`     pending files, drained oldest name first
//! - `processed/`  files whose every line was accepted
//! - `failed/`     files with at least one rejected line

use std::io;
use std::path::{Path, PathBuf};

pub const QUEUE_EXTENSION: &str = "jsonl";
pub const PROCESSED_DIR: &str = "processed";
pub const FAILED_DIR: &str = "failed";

#[derive(Debug, Clone)]
pub struct Queue {
    root: PathBuf,
}

impl Queue {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Pending files sorted by name. A missing root is an empty queue.
    pub async fn pending(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_queue_file = path.extension().and_then(|e| e.to_str()) == Some(QUEUE_EXTENSION);
            if is_queue_file && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Move a drained file out of the pending set. An archived file with the
    /// same name is kept; the newcomer gets a `-N` suffix.
    pub async fn archive(&self, path: &Path, clean: bool) -> io::Result<PathBuf> {
        let dir = self.root.join(if clean { PROCESSED_DIR } else { FAILED_DIR });
        tokio::fs::create_dir_all(&dir).await?;

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "queue path has no file name"))?;

        let mut dest = dir.join(format!("{stem}.{QUEUE_EXTENSION}"));
        let mut n = 1;
        while tokio::fs::try_exists(&dest).await? {
            dest = dir.join(format!("{stem}-{n}.{QUEUE_EXTENSION}"));
            n += 1;
        }
        tokio::fs::rename(path, &dest).await?;
        Ok(dest)
    }
}
