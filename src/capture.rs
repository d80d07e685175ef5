use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Append-only temporary file holding every raw byte a peer sent.
///
/// The file is removed when the capture (or the [`FinishedCapture`] it
/// turns into) is dropped.
pub struct Capture {
    file: File,
    path: TempPath,
    written: u64,
}

impl Capture {
    pub async fn create(temp_dir: &Path) -> Result<Self> {
        let dir = temp_dir.to_path_buf();
        let named = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix("maildump").tempfile_in(dir)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .and_then(|created| created)
        .map_err(|e| Error::persistence_at("create capture in", temp_dir, e))?;
        let (file, path) = named.into_parts();
        Ok(Self {
            file: File::from_std(file),
            path,
            written: 0,
        })
    }

    pub async fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .write_all(bytes)
            .await
            .map_err(|e| Error::persistence_at("write capture", &self.path, e))?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and syncs the file, then closes the write handle.
    pub async fn finish(mut self) -> Result<FinishedCapture> {
        self.file
            .flush()
            .await
            .map_err(|e| Error::persistence_at("flush capture", &self.path, e))?;
        self.file
            .sync_all()
            .await
            .map_err(|e| Error::persistence_at("sync capture", &self.path, e))?;
        let size = self
            .file
            .metadata()
            .await
            .map_err(|e| Error::persistence_at("stat capture", &self.path, e))?
            .len();
        drop(self.file);
        Ok(FinishedCapture {
            path: self.path,
            size,
        })
    }
}

/// A closed capture file waiting to be copied out or discarded.
pub struct FinishedCapture {
    path: TempPath,
    size: u64,
}

impl FinishedCapture {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the temporary file now instead of on drop.
    pub async fn discard(self) -> Result<PathBuf> {
        let path = self.path.to_path_buf();
        let temp = self.path;
        tokio::task::spawn_blocking(move || temp.close())
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
            .and_then(|closed| closed)
            .map_err(|e| Error::persistence_at("remove capture", &path, e))?;
        Ok(path)
    }
}
