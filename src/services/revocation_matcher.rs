use crate::adapters::transport::{MessagingTransport, TransportError};
use crate::domain::{MessageKind, MessageRecord, NoticeError, Payload, ReceiverHandle, RevocationNotice};
use crate::services::receiver_resolver::ReceiverResolver;
use crate::services::shadow_store::ShadowStore;
use opentelemetry::{KeyValue, global, metrics::Counter};
use std::sync::Arc;

#[derive(Clone, Debug)]
struct Metrics {
    forwarded: Counter<u64>,
    forward_failures: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("shadow-relay");
        Self {
            forwarded: meter
                .u64_counter("revocations_forwarded_total")
                .with_description("Total revoked messages reconstructed and sent to the receiver")
                .build(),
            forward_failures: meter
                .u64_counter("revocation_forward_failures_total")
                .with_description("Total reconstructions the transport failed to deliver")
                .build(),
        }
    }
}

/// What became of one revocation note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevocationOutcome {
    Forwarded { id: String, kind: MessageKind },
    /// A note, but not about a withdrawn message.
    NotRevocation,
    /// Withdrawal marker without a usable message reference.
    Malformed,
    /// Evicted already, or never observed.
    UnknownMessage { id: String },
    NoReceiver,
    SendFailed { id: String },
}

#[derive(Debug)]
pub struct RevocationMatcher {
    store: ShadowStore,
    resolver: Arc<ReceiverResolver>,
    transport: Arc<dyn MessagingTransport>,
    metrics: Metrics,
}

impl RevocationMatcher {
    #[must_use]
    pub fn new(store: ShadowStore, resolver: Arc<ReceiverResolver>, transport: Arc<dyn MessagingTransport>) -> Self {
        Self { store, resolver, transport, metrics: Metrics::new() }
    }

    /// Takes a classified note. Unrelated and malformed notes are dropped here.
    pub async fn handle_note(&self, note: Result<RevocationNotice, NoticeError>) -> RevocationOutcome {
        match note {
            Ok(notice) => self.handle(&notice).await,
            Err(NoticeError::NotRevocation) => RevocationOutcome::NotRevocation,
            Err(e @ NoticeError::MissingReference) => {
                tracing::warn!(error = %e, "Dropping malformed revocation note");
                RevocationOutcome::Malformed
            }
        }
    }

    /// Looks the withdrawn message up and, if it is still shadowed, sends its
    /// reconstruction to the receiver. One attempt, no retry.
    #[tracing::instrument(skip(self, notice), fields(message.id = %notice.referenced_id))]
    pub async fn handle(&self, notice: &RevocationNotice) -> RevocationOutcome {
        let id = notice.referenced_id.clone();

        let Some(record) = self.store.get(&id) else {
            tracing::debug!("Revoked message is not shadowed");
            return RevocationOutcome::UnknownMessage { id };
        };

        let Some(target) = self.resolver.resolve().await else {
            tracing::warn!("No receiver for revoked message, not forwarding");
            return RevocationOutcome::NoReceiver;
        };

        let kind = record.kind();
        match self.forward(&target, &record, notice).await {
            Ok(()) => {
                tracing::info!(kind = %kind, receiver.id = %target.id, "Forwarded revoked message");
                self.metrics.forwarded.add(1, &[KeyValue::new("kind", kind.noun())]);
                RevocationOutcome::Forwarded { id, kind }
            }
            Err(e) => {
                tracing::error!(error = %e, kind = %kind, "Failed to forward revoked message");
                self.metrics.forward_failures.add(1, &[KeyValue::new("kind", kind.noun())]);
                RevocationOutcome::SendFailed { id }
            }
        }
    }

    async fn forward(
        &self,
        target: &ReceiverHandle,
        record: &MessageRecord,
        notice: &RevocationNotice,
    ) -> Result<(), TransportError> {
        self.transport.send_text(target, &reconstruction_text(record, notice)).await?;

        if let Payload::Media { kind, path } = &record.payload {
            match kind {
                MessageKind::Image => self.transport.send_image(target, path).await?,
                MessageKind::Video => self.transport.send_video(target, path).await?,
                MessageKind::File | MessageKind::Text => self.transport.send_file(target, path).await?,
            }
        }
        Ok(())
    }
}

/// The sentence sent ahead of (or instead of) the recovered content.
#[must_use]
pub fn reconstruction_text(record: &MessageRecord, notice: &RevocationNotice) -> String {
    match &record.payload {
        Payload::Text(body) => format!("{} just sent this message: {body}", notice.attribution()),
        Payload::Media { kind, .. } => format!("{} just sent this {}:", notice.attribution(), kind.noun()),
    }
}
