use crate::domain::message::MessageKind;
use crate::domain::revocation::{NoticeError, RevocationNotice};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Text,
    Image,
    Video,
    File,
    /// System note; revocations arrive as these.
    Note,
    #[serde(other)]
    Other,
}

/// An event as delivered by the transport.
///
/// `content` is the text body for `Text`, the original file reference for
/// media (the transport knows how to fetch it), and the raw note for `Note`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: String,
    pub kind: EventKind,
    #[serde(with = "time::serde::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sender_display_name: String,
    #[serde(default)]
    pub sender_actual_name: String,
    #[serde(default)]
    pub is_group: bool,
}

/// An ordinary message worth shadowing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub id: String,
    pub kind: MessageKind,
    pub created_at: OffsetDateTime,
    pub content: String,
    pub sender_display_name: String,
    pub sender_actual_name: String,
    pub is_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedEvent {
    Message(IncomingMessage),
    Note(Result<RevocationNotice, NoticeError>),
    Unsupported(EventKind),
}

impl InboundEvent {
    /// Decides once what this event is. Notes are parsed here, so a malformed
    /// revocation is carried as an error rather than re-inspected later.
    #[must_use]
    pub fn classify(self) -> ClassifiedEvent {
        let kind = match self.kind {
            EventKind::Text => MessageKind::Text,
            EventKind::Image => MessageKind::Image,
            EventKind::Video => MessageKind::Video,
            EventKind::File => MessageKind::File,
            EventKind::Note => {
                let parsed = RevocationNotice::parse(&self.content).map(|notice| {
                    notice.with_sender(self.sender_display_name, self.sender_actual_name, self.is_group)
                });
                return ClassifiedEvent::Note(parsed);
            }
            EventKind::Other => return ClassifiedEvent::Unsupported(self.kind),
        };

        ClassifiedEvent::Message(IncomingMessage {
            id: self.id,
            kind,
            created_at: self.created_at,
            content: self.content,
            sender_display_name: self.sender_display_name,
            sender_actual_name: self.sender_actual_name,
            is_group: self.is_group,
        })
    }
}
