use std::fmt;
use std::path::{Path, PathBuf};
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Text,
    Image,
    Video,
    File,
}

impl MessageKind {
    /// How the kind is named in a forwarded reconstruction.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Text => "message",
            Self::Image => "image",
            Self::Video => "video",
            Self::File => "file",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// What a shadowed message retained: the literal body, or the managed path of
/// its materialized media.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Media { kind: MessageKind, path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: String,
    pub payload: Payload,
    pub created_at: OffsetDateTime,
    pub sender_display_name: String,
    pub sender_actual_name: String,
    pub is_group: bool,
    pub(crate) materialized: bool,
}

impl MessageRecord {
    #[must_use]
    pub fn text(id: impl Into<String>, body: impl Into<String>, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            payload: Payload::Text(body.into()),
            created_at,
            sender_display_name: String::new(),
            sender_actual_name: String::new(),
            is_group: false,
            materialized: false,
        }
    }

    #[must_use]
    pub fn media(id: impl Into<String>, kind: MessageKind, path: PathBuf, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            payload: Payload::Media { kind, path },
            created_at,
            sender_display_name: String::new(),
            sender_actual_name: String::new(),
            is_group: false,
            materialized: false,
        }
    }

    #[must_use]
    pub fn with_sender(mut self, display_name: impl Into<String>, actual_name: impl Into<String>, is_group: bool) -> Self {
        self.sender_display_name = display_name.into();
        self.sender_actual_name = actual_name.into();
        self.is_group = is_group;
        self
    }

    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match &self.payload {
            Payload::Text(_) => MessageKind::Text,
            Payload::Media { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn media_path(&self) -> Option<&Path> {
        match &self.payload {
            Payload::Text(_) => None,
            Payload::Media { path, .. } => Some(path),
        }
    }

    #[must_use]
    pub const fn is_materialized(&self) -> bool {
        self.materialized
    }

    /// Strictly older than `ttl` at `now`. A record exactly `ttl` old is kept.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}
