use crate::domain::{Contact, ReceiverHandle};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Send to {target} failed: {reason}")]
    SendFailed { target: String, reason: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("External service error: {0}")]
    Other(#[from] anyhow::Error),
}

/// The live chat session: contact lookup, outbound sends and media download.
#[async_trait]
pub trait MessagingTransport: Send + Sync + std::fmt::Debug {
    async fn list_contacts(&self) -> Result<Vec<Contact>, TransportError>;

    async fn send_text(&self, target: &ReceiverHandle, text: &str) -> Result<(), TransportError>;

    async fn send_image(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError>;

    async fn send_video(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError>;

    async fn send_file(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError>;

    /// Writes the payload behind `source` (the event's media reference) to `destination`.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be fetched or written.
    async fn download_media(&self, source: &str, destination: &Path) -> Result<(), TransportError>;
}
