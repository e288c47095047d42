use crate::domain::{ClassifiedEvent, InboundEvent, IncomingMessage, MessageKind, MessageRecord};
use crate::error::Result;
use crate::services::file_materializer::{FileMaterializer, Materialized};
use crate::services::revocation_matcher::{RevocationMatcher, RevocationOutcome};
use crate::services::shadow_store::{SeenSet, ShadowStore};
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::path::Path;
use std::sync::Arc;
use time::{Duration, OffsetDateTime};

/// Messages older than this on arrival are backlog replayed on reconnect and
/// are not shadowed.
pub const STALE_MESSAGE_WINDOW: Duration = Duration::seconds(60);

#[derive(Clone, Debug)]
struct Metrics {
    shadowed: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("shadow-relay");
        Self {
            shadowed: meter
                .u64_counter("messages_shadowed_total")
                .with_description("Total inbound messages retained in the shadow store")
                .build(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Shadowed { id: String, kind: MessageKind },
    /// The id was still live and its record was replaced in place.
    Updated { id: String, kind: MessageKind },
    /// Seen before and since evicted.
    AlreadySeen { id: String },
    Stale { id: String },
    Unsupported,
    Revocation(RevocationOutcome),
    /// Nothing was retained: a record whose media could not be fetched is
    /// withdrawn again, so later revocations see it as unknown.
    Failed { id: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    store: ShadowStore,
    seen: SeenSet,
    materializer: FileMaterializer,
    matcher: Arc<RevocationMatcher>,
    metrics: Metrics,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(store: ShadowStore, seen: SeenSet, materializer: FileMaterializer, matcher: Arc<RevocationMatcher>) -> Self {
        Self { store, seen, materializer, matcher, metrics: Metrics::new() }
    }

    /// Entry point for every inbound event. Never fails; the outcome says what
    /// was done.
    pub async fn handle(&self, event: InboundEvent) -> IngestOutcome {
        self.handle_at(event, OffsetDateTime::now_utc()).await
    }

    #[tracing::instrument(skip(self, event), fields(message.id = %event.id, kind = ?event.kind, is_group = event.is_group))]
    pub async fn handle_at(&self, event: InboundEvent, now: OffsetDateTime) -> IngestOutcome {
        let message = match event.classify() {
            ClassifiedEvent::Note(note) => return IngestOutcome::Revocation(self.matcher.handle_note(note).await),
            ClassifiedEvent::Unsupported(kind) => {
                tracing::debug!(kind = ?kind, "Ignoring unsupported event");
                return IngestOutcome::Unsupported;
            }
            ClassifiedEvent::Message(message) => message,
        };

        let id = message.id.clone();
        match self.shadow(message, now).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Failed to shadow message");
                IngestOutcome::Failed { id, reason: e.to_string() }
            }
        }
    }

    async fn shadow(&self, message: IncomingMessage, now: OffsetDateTime) -> Result<IngestOutcome> {
        let live = self.store.get(&message.id);
        let first_sighting = self.seen.mark(&message.id, message.created_at);
        if live.is_none() && !first_sighting {
            tracing::debug!("Message already ingested");
            return Ok(IngestOutcome::AlreadySeen { id: message.id });
        }

        if now - message.created_at > STALE_MESSAGE_WINDOW {
            tracing::debug!(created_at = %message.created_at, "Skipping stale message");
            return Ok(IngestOutcome::Stale { id: message.id });
        }

        let record = self.build_record(&message, live.as_ref())?;
        let (id, kind) = (record.id.clone(), record.kind());
        let replaced = self.store.put(record.clone()).is_some();

        // The record is visible before its bytes land; forwarding reads the
        // file only at send time.
        match self.materializer.materialize(&message.content, &record).await {
            Ok(Materialized::Written(path)) => {
                self.store.mark_materialized(&id, &path);
            }
            Ok(Materialized::AlreadyPresent | Materialized::NotMedia) => {}
            Err(e) => {
                if let Some(path) = record.media_path() {
                    self.withdraw(&id, path).await;
                }
                return Err(e);
            }
        }

        self.metrics.shadowed.add(1, &[KeyValue::new("kind", kind.noun())]);
        if replaced {
            tracing::debug!("Shadow record updated");
            Ok(IngestOutcome::Updated { id, kind })
        } else {
            tracing::debug!("Message shadowed");
            Ok(IngestOutcome::Shadowed { id, kind })
        }
    }

    /// Builds the record for `message`. A live media record keeps its payload:
    /// its file stays where it was written until the sweeper evicts it.
    fn build_record(&self, message: &IncomingMessage, live: Option<&MessageRecord>) -> Result<MessageRecord> {
        let record = match live {
            Some(previous) if previous.media_path().is_some() => previous.clone(),
            _ => {
                let created_at = live.map_or(message.created_at, |r| r.created_at);
                match message.kind {
                    MessageKind::Text => MessageRecord::text(message.id.clone(), message.content.clone(), created_at),
                    kind => MessageRecord::media(
                        message.id.clone(),
                        kind,
                        self.materializer.target_path(&message.content)?,
                        created_at,
                    ),
                }
            }
        };

        Ok(record.with_sender(message.sender_display_name.clone(), message.sender_actual_name.clone(), message.is_group))
    }

    /// Drops a record whose download failed, along with any partial file no
    /// other record points at.
    async fn withdraw(&self, id: &str, path: &Path) {
        if self.store.remove_unmaterialized(id, path).is_none() || self.store.references_path(path) {
            return;
        }
        if let Err(e) = FileMaterializer::discard(path).await {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove partial download");
        }
    }
}
