use crate::adapters::transport::MessagingTransport;
use crate::domain::MessageRecord;
use crate::error::{AppError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    Written(PathBuf),
    AlreadyPresent,
    NotMedia,
}

/// Owns the managed download directory: where media lands, and how it leaves.
#[derive(Debug, Clone)]
pub struct FileMaterializer {
    download_dir: PathBuf,
    transport: Arc<dyn MessagingTransport>,
}

impl FileMaterializer {
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>, transport: Arc<dyn MessagingTransport>) -> Self {
        Self { download_dir: download_dir.into(), transport }
    }

    /// Creates the download directory if needed and empties it, so nothing
    /// half-written survives a restart. Returns how many entries were removed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be created, listed or cleared.
    #[tracing::instrument(skip(self), fields(dir = %self.download_dir.display()), err)]
    pub async fn prepare(&self) -> Result<usize> {
        tokio::fs::create_dir_all(&self.download_dir).await?;

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.download_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
            removed += 1;
        }

        if removed > 0 {
            tracing::info!(count = removed, "Cleared leftover downloads");
        }
        Ok(removed)
    }

    /// Where media named by `source` is kept: its basename, relocated into the
    /// download directory. Two messages with the same file name share a path.
    ///
    /// # Errors
    /// Returns `AppError::NoFileName` if `source` has no final path component.
    pub fn target_path(&self, source: &str) -> Result<PathBuf> {
        let name = Path::new(source).file_name().ok_or_else(|| AppError::NoFileName(source.to_string()))?;
        Ok(self.download_dir.join(name))
    }

    /// Fetches the media behind `source` into the record's managed path,
    /// unless the record says it is already there.
    ///
    /// # Errors
    /// Returns an error if the transport fails to deliver the payload.
    #[tracing::instrument(skip(self, record), fields(message.id = %record.id), err)]
    pub async fn materialize(&self, source: &str, record: &MessageRecord) -> Result<Materialized> {
        let Some(path) = record.media_path() else {
            return Ok(Materialized::NotMedia);
        };
        if record.is_materialized() {
            return Ok(Materialized::AlreadyPresent);
        }

        self.transport.download_media(source, path).await?;
        tracing::debug!(path = %path.display(), "Media materialized");
        Ok(Materialized::Written(path.to_path_buf()))
    }

    /// Deletes a materialized file. A file that is already gone is not an error.
    ///
    /// # Errors
    /// Returns an error for any failure other than the file being absent.
    pub async fn discard(path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Media file already gone");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::transport::TransportError;
    use crate::domain::{Contact, MessageKind, ReceiverHandle};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[derive(Debug, Default)]
    struct FetchOnlyTransport {
        downloads: AtomicUsize,
    }

    #[async_trait]
    impl MessagingTransport for FetchOnlyTransport {
        async fn list_contacts(&self) -> std::result::Result<Vec<Contact>, TransportError> {
            Ok(Vec::new())
        }
        async fn send_text(&self, _: &ReceiverHandle, _: &str) -> std::result::Result<(), TransportError> {
            Ok(())
        }
        async fn send_image(&self, _: &ReceiverHandle, _: &Path) -> std::result::Result<(), TransportError> {
            Ok(())
        }
        async fn send_video(&self, _: &ReceiverHandle, _: &Path) -> std::result::Result<(), TransportError> {
            Ok(())
        }
        async fn send_file(&self, _: &ReceiverHandle, _: &Path) -> std::result::Result<(), TransportError> {
            Ok(())
        }
        async fn download_media(&self, source: &str, destination: &Path) -> std::result::Result<(), TransportError> {
            self.downloads.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(destination, source.as_bytes()).await?;
            Ok(())
        }
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("shadow-relay-media-{}", Uuid::new_v4()))
    }

    #[test]
    fn test_target_path_keeps_basename_only() {
        let materializer = FileMaterializer::new("/var/downloads", Arc::new(FetchOnlyTransport::default()));

        assert_eq!(materializer.target_path("/tmp/wx/240101-cat.png").unwrap(), PathBuf::from("/var/downloads/240101-cat.png"));
        assert_eq!(materializer.target_path("report.pdf").unwrap(), PathBuf::from("/var/downloads/report.pdf"));
        assert!(matches!(materializer.target_path("/"), Err(AppError::NoFileName(_))));
        assert!(matches!(materializer.target_path(""), Err(AppError::NoFileName(_))));
    }

    #[tokio::test]
    async fn test_prepare_creates_and_clears_directory() {
        let dir = scratch_dir();
        let materializer = FileMaterializer::new(&dir, Arc::new(FetchOnlyTransport::default()));

        assert_eq!(materializer.prepare().await.unwrap(), 0);
        assert!(dir.is_dir());

        tokio::fs::write(dir.join("stale.png"), b"partial").await.unwrap();
        tokio::fs::create_dir(dir.join("nested")).await.unwrap();
        assert_eq!(materializer.prepare().await.unwrap(), 2);
        assert!(std::fs::read_dir(&dir).unwrap().next().is_none());

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_materialize_is_idempotent_per_record() {
        let dir = scratch_dir();
        let transport = Arc::new(FetchOnlyTransport::default());
        let materializer = FileMaterializer::new(&dir, Arc::clone(&transport) as Arc<dyn MessagingTransport>);
        materializer.prepare().await.unwrap();

        let path = materializer.target_path("/in/cat.png").unwrap();
        let mut record = MessageRecord::media("m1", MessageKind::Image, path.clone(), OffsetDateTime::now_utc());

        assert_eq!(materializer.materialize("/in/cat.png", &record).await.unwrap(), Materialized::Written(path.clone()));
        assert!(path.exists());

        record.materialized = true;
        assert_eq!(materializer.materialize("/in/cat.png", &record).await.unwrap(), Materialized::AlreadyPresent);
        assert_eq!(transport.downloads.load(Ordering::SeqCst), 1);

        let text = MessageRecord::text("m2", "hi", OffsetDateTime::now_utc());
        assert_eq!(materializer.materialize("", &text).await.unwrap(), Materialized::NotMedia);

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_tolerates_missing_file() {
        let dir = scratch_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("clip.mp4");
        tokio::fs::write(&path, b"data").await.unwrap();

        assert!(FileMaterializer::discard(&path).await.unwrap());
        assert!(!FileMaterializer::discard(&path).await.unwrap());

        tokio::fs::remove_dir_all(dir).await.unwrap();
    }
}
