use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::capture::FinishedCapture;
use crate::error::{Error, Result};

/// Final file name for one session's capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    pub sender: String,
    pub recipient: String,
    pub timestamp: i64,
    pub sequence: Option<u64>,
}

impl ArtifactName {
    pub fn now(sender: &str, recipient: &str) -> Self {
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            timestamp: Utc::now().timestamp(),
            sequence: None,
        }
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// `<sender>-<recipient>-<unix seconds>[-<sequence>].txt`, with `@`
    /// written as `.` in the address fields.
    pub fn file_name(&self) -> String {
        let sender = self.sender.replace('@', ".");
        let recipient = self.recipient.replace('@', ".");
        match self.sequence {
            Some(seq) => format!("{}-{}-{}-{}.txt", sender, recipient, self.timestamp, seq),
            None => format!("{}-{}-{}.txt", sender, recipient, self.timestamp),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Stored {
    Saved { path: PathBuf, size: u64 },
    TooSmall { size: u64 },
}

/// Moves finished captures into the output directory.
#[derive(Debug, Clone)]
pub struct Sink {
    output_dir: PathBuf,
    min_size: u64,
}

impl Sink {
    pub fn new(output_dir: impl Into<PathBuf>, min_size: u64) -> Self {
        Self {
            output_dir: output_dir.into(),
            min_size,
        }
    }

    /// Copies the capture out if it is larger than the floor. The temporary
    /// file is removed either way.
    pub async fn store(&self, capture: FinishedCapture, name: &ArtifactName) -> Result<Stored> {
        let size = capture.size();
        let outcome = if size > self.min_size {
            let path = self.output_dir.join(name.file_name());
            match copy_file(capture.path(), &path).await {
                Ok(_) => Ok(Stored::Saved { path, size }),
                Err(e) => Err(e),
            }
        } else {
            Ok(Stored::TooSmall { size })
        };
        let removed = capture.discard().await;
        let stored = outcome?;
        removed?;
        Ok(stored)
    }
}

async fn copy_file(src: &Path, dst: &Path) -> Result<u64> {
    tokio::fs::copy(src, dst)
        .await
        .map_err(|e| Error::persistence(format!("copy {:?} to {:?}", src, dst), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Capture;

    async fn finished(temp: &Path, bytes: &[u8]) -> FinishedCapture {
        let mut capture = Capture::create(temp).await.unwrap();
        capture.append(bytes).await.unwrap();
        capture.finish().await.unwrap()
    }

    #[test]
    fn names() {
        let name = ArtifactName {
            sender: "a@b.com".to_string(),
            recipient: "c@d.com".to_string(),
            timestamp: 1700000000,
            sequence: None,
        };
        assert_eq!(name.file_name(), "a.b.com-c.d.com-1700000000.txt");
        assert_eq!(
            name.with_sequence(7).file_name(),
            "a.b.com-c.d.com-1700000000-7.txt"
        );
    }

    #[tokio::test]
    async fn saves_large_enough_captures() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let body = vec![b'x'; 51];
        let capture = finished(temp.path(), &body).await;
        let temp_path = capture.path().to_path_buf();

        let sink = Sink::new(out.path(), 50);
        let name = ArtifactName::now("a@b.com", "c@d.com");
        let stored = sink.store(capture, &name).await.unwrap();

        let expected = out.path().join(name.file_name());
        assert_eq!(
            stored,
            Stored::Saved {
                path: expected.clone(),
                size: 51
            }
        );
        assert_eq!(std::fs::read(expected).unwrap(), body);
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn size_floor_is_exclusive() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let capture = finished(temp.path(), &[b'x'; 50]).await;
        let temp_path = capture.path().to_path_buf();

        let sink = Sink::new(out.path(), 50);
        let stored = sink
            .store(capture, &ArtifactName::now("a@b", "c@d"))
            .await
            .unwrap();

        assert_eq!(stored, Stored::TooSmall { size: 50 });
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
        assert!(!temp_path.exists());
    }

    #[tokio::test]
    async fn copy_failure_still_removes_temp_file() {
        let temp = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let capture = finished(temp.path(), &[b'x'; 64]).await;
        let temp_path = capture.path().to_path_buf();

        let sink = Sink::new(out.path().join("missing"), 50);
        let err = sink
            .store(capture, &ArtifactName::now("a@b", "c@d"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Persistence { .. }));
        assert!(!temp_path.exists());
    }
}
