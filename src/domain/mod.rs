pub mod contact;
pub mod event;
pub mod message;
pub mod revocation;

pub use contact::{Contact, MatchType, ReceiverHandle};
pub use event::{ClassifiedEvent, EventKind, InboundEvent, IncomingMessage};
pub use message::{MessageKind, MessageRecord, Payload};
pub use revocation::{NoticeError, REVOCATION_MARKER, RevocationNotice};
