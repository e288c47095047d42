use serde::{Deserialize, Serialize};

/// A contact as listed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub remark_name: String,
}

/// Which contact field the configured receiver name is compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Nickname,
    #[default]
    RemarkName,
}

impl MatchType {
    #[must_use]
    pub fn matches(self, contact: &Contact, name: &str) -> bool {
        match self {
            Self::Nickname => contact.display_name == name,
            Self::RemarkName => contact.remark_name == name,
        }
    }
}

/// The resolved destination for reconstructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiverHandle {
    pub id: String,
    pub display_name: String,
}

impl From<&Contact> for ReceiverHandle {
    fn from(contact: &Contact) -> Self {
        Self { id: contact.id.clone(), display_name: contact.display_name.clone() }
    }
}
