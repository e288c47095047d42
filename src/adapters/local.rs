use crate::adapters::transport::{MessagingTransport, TransportError};
use crate::domain::{Contact, InboundEvent, ReceiverHandle};
use crate::services::ingestion::{IngestOutcome, IngestionPipeline};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::{Mutex, watch};

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Outbound<'a> {
    Text { to: &'a str, text: &'a str },
    Image { to: &'a str, path: &'a Path },
    Video { to: &'a str, path: &'a Path },
    File { to: &'a str, path: &'a Path },
}

/// Transport for running without a live chat session: contacts come from a
/// JSON file, sends are written as JSON lines, and media sources are local
/// paths that get copied.
#[derive(Debug)]
pub struct LocalTransport<W = Stdout> {
    contacts: Vec<Contact>,
    out: Mutex<W>,
}

impl LocalTransport<Stdout> {
    #[must_use]
    pub fn stdout(contacts: Vec<Contact>) -> Self {
        Self::new(contacts, tokio::io::stdout())
    }
}

impl<W> LocalTransport<W>
where
    W: AsyncWrite + Unpin + Send + Debug,
{
    #[must_use]
    pub fn new(contacts: Vec<Contact>, out: W) -> Self {
        Self { contacts, out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    async fn emit(&self, outbound: &Outbound<'_>) -> Result<(), TransportError> {
        let mut line = serde_json::to_vec(outbound).map_err(|e| TransportError::Other(e.into()))?;
        line.push(b'\n');

        let mut out = self.out.lock().await;
        out.write_all(&line).await?;
        out.flush().await?;
        Ok(())
    }
}

/// Reads a contact list; no path means no contacts.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a JSON contact array.
pub async fn load_contacts(path: Option<&Path>) -> Result<Vec<Contact>, TransportError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content).map_err(|e| TransportError::Other(e.into()))
}

#[async_trait]
impl<W> MessagingTransport for LocalTransport<W>
where
    W: AsyncWrite + Unpin + Send + Debug,
{
    async fn list_contacts(&self) -> Result<Vec<Contact>, TransportError> {
        Ok(self.contacts.clone())
    }

    async fn send_text(&self, target: &ReceiverHandle, text: &str) -> Result<(), TransportError> {
        self.emit(&Outbound::Text { to: &target.id, text }).await
    }

    async fn send_image(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError> {
        self.emit(&Outbound::Image { to: &target.id, path }).await
    }

    async fn send_video(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError> {
        self.emit(&Outbound::Video { to: &target.id, path }).await
    }

    async fn send_file(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError> {
        self.emit(&Outbound::File { to: &target.id, path }).await
    }

    async fn download_media(&self, source: &str, destination: &Path) -> Result<(), TransportError> {
        tokio::fs::copy(source, destination).await?;
        Ok(())
    }
}

/// Feeds newline-delimited JSON events to the pipeline, in order, until the
/// input ends or `shutdown` flips. Returns how many events were handled.
pub async fn pump_events<R>(reader: R, pipeline: &IngestionPipeline, mut shutdown: watch::Receiver<bool>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while !*shutdown.borrow() {
        let line = tokio::select! {
            line = lines.next_line() => line,
            res = shutdown.changed() => {
                if res.is_err() {
                    break;
                }
                continue;
            }
        };

        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read event stream");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<InboundEvent>(&line) {
            Ok(event) => {
                let outcome = pipeline.handle(event).await;
                if let IngestOutcome::Failed { id, reason } = &outcome {
                    tracing::warn!(message.id = %id, reason = %reason, "Event not shadowed");
                }
                handled += 1;
            }
            Err(e) => tracing::warn!(error = %e, "Dropping unparseable event"),
        }
    }
    handled
}
