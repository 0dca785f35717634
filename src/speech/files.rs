use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Flat directory of rendered audio files, addressed by generated filename.
/// Files live and die independently of any chat data.
pub struct AudioFileStore {
    dir: PathBuf,
}

/// Generated names are uuid-based, so anything outside this shape is either
/// a client mistake or a traversal attempt.
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !name.contains("..")
}

impl AudioFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist audio bytes under a fresh filename and return it.
    pub async fn save(&self, bytes: &[u8], extension: &str) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("create audio directory")?;

        let filename = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(self.dir.join(&filename), bytes)
            .await
            .context("write audio file")?;
        Ok(filename)
    }

    /// Read a file back, or `None` when it does not exist. Unsafe names are
    /// rejected as absent rather than touching the filesystem.
    pub async fn load(&self, filename: &str) -> Result<Option<Vec<u8>>> {
        if !is_safe_filename(filename) {
            return Ok(None);
        }
        match tokio::fs::read(self.dir.join(filename)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("read audio file"),
        }
    }

    /// Delete a file; `false` when it was already gone.
    pub async fn delete(&self, filename: &str) -> Result<bool> {
        if !is_safe_filename(filename) {
            return Ok(false);
        }
        match tokio::fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).context("delete audio file"),
        }
    }
}
