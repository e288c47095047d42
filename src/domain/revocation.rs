use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Text the chat service puts in a system note when a peer withdraws a message.
pub const REVOCATION_MARKER: &str = "撤回了一条消息";

static MSGID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"<msgid>(.*?)</msgid>").unwrap()
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoticeError {
    #[error("Note is not a revocation")]
    NotRevocation,
    #[error("Revocation note carries no message reference")]
    MissingReference,
}

/// A withdrawal of an earlier message. Never stored; only used to find the
/// shadow record and to name the sender in the reconstruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationNotice {
    pub referenced_id: String,
    pub sender_display_name: String,
    pub sender_actual_name: String,
    pub is_group: bool,
}

impl RevocationNotice {
    /// Parses the raw note text. The sender fields are filled in by the caller.
    ///
    /// # Errors
    /// Returns `NoticeError::NotRevocation` when the marker is absent and
    /// `NoticeError::MissingReference` when no non-empty `<msgid>` is present.
    pub fn parse(raw: &str) -> Result<Self, NoticeError> {
        if !raw.contains(REVOCATION_MARKER) {
            return Err(NoticeError::NotRevocation);
        }

        let referenced_id = MSGID_PATTERN
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .filter(|id| !id.is_empty())
            .ok_or(NoticeError::MissingReference)?;

        Ok(Self {
            referenced_id: referenced_id.to_string(),
            sender_display_name: String::new(),
            sender_actual_name: String::new(),
            is_group: false,
        })
    }

    #[must_use]
    pub fn with_sender(mut self, display_name: impl Into<String>, actual_name: impl Into<String>, is_group: bool) -> Self {
        self.sender_display_name = display_name.into();
        self.sender_actual_name = actual_name.into();
        self.is_group = is_group;
        self
    }

    /// Who sent the withdrawn message, as shown to the receiver.
    #[must_use]
    pub fn attribution(&self) -> String {
        if self.is_group {
            format!("Group [{}] member [{}]", self.sender_display_name, self.sender_actual_name)
        } else {
            format!("[{}]", self.sender_display_name)
        }
    }
}
