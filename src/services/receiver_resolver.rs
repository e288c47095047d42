use crate::adapters::transport::MessagingTransport;
use crate::config::ReceiverSettings;
use crate::domain::ReceiverHandle;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Finds the contact reconstructions go to, and remembers it once found.
///
/// A failed lookup is not remembered: the next call scans again.
#[derive(Debug)]
pub struct ReceiverResolver {
    transport: Arc<dyn MessagingTransport>,
    rule: ReceiverSettings,
    resolved: Mutex<Option<ReceiverHandle>>,
}

impl ReceiverResolver {
    #[must_use]
    pub fn new(transport: Arc<dyn MessagingTransport>, rule: ReceiverSettings) -> Self {
        Self { transport, rule, resolved: Mutex::new(None) }
    }

    pub async fn resolve(&self) -> Option<ReceiverHandle> {
        // Held across the scan so concurrent callers share one lookup.
        let mut resolved = self.resolved.lock().await;
        if let Some(handle) = resolved.as_ref() {
            return Some(handle.clone());
        }

        let contacts = match self.transport.list_contacts().await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list contacts");
                return None;
            }
        };

        let found = contacts
            .iter()
            .find(|contact| self.rule.match_type.matches(contact, &self.rule.name))
            .map(ReceiverHandle::from);

        match &found {
            Some(handle) => {
                tracing::info!(receiver.id = %handle.id, receiver.name = %self.rule.name, "Resolved receiver");
                *resolved = found.clone();
            }
            None => {
                tracing::error!(
                    match_type = ?self.rule.match_type,
                    name = %self.rule.name,
                    contacts = contacts.len(),
                    "Receiver not found"
                );
            }
        }
        found
    }

    pub async fn reset(&self) {
        *self.resolved.lock().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::transport::TransportError;
    use crate::domain::{Contact, MatchType};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct ContactBook {
        contacts: Vec<Contact>,
        listings: AtomicUsize,
    }

    impl ContactBook {
        fn new(contacts: Vec<Contact>) -> Arc<Self> {
            Arc::new(Self { contacts, listings: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl MessagingTransport for ContactBook {
        async fn list_contacts(&self) -> Result<Vec<Contact>, TransportError> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            Ok(self.contacts.clone())
        }
        async fn send_text(&self, _: &ReceiverHandle, _: &str) -> Result<(), TransportError> {
            Ok(())
        }
        async fn send_image(&self, _: &ReceiverHandle, _: &Path) -> Result<(), TransportError> {
            Ok(())
        }
        async fn send_video(&self, _: &ReceiverHandle, _: &Path) -> Result<(), TransportError> {
            Ok(())
        }
        async fn send_file(&self, _: &ReceiverHandle, _: &Path) -> Result<(), TransportError> {
            Ok(())
        }
        async fn download_media(&self, _: &str, _: &Path) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn contact(id: &str, display: &str, remark: &str) -> Contact {
        Contact { id: id.into(), display_name: display.into(), remark_name: remark.into() }
    }

    fn rule(match_type: MatchType, name: &str) -> ReceiverSettings {
        ReceiverSettings { match_type, name: name.into() }
    }

    #[tokio::test]
    async fn test_first_match_wins_and_is_cached() {
        let book = ContactBook::new(vec![
            contact("@1", "Alice", ""),
            contact("@2", "Relay", "me"),
            contact("@3", "Relay", "other"),
        ]);
        let resolver = ReceiverResolver::new(Arc::clone(&book) as Arc<dyn MessagingTransport>, rule(MatchType::Nickname, "Relay"));

        assert_eq!(resolver.resolve().await.unwrap().id, "@2");
        assert_eq!(resolver.resolve().await.unwrap().id, "@2");
        assert_eq!(book.listings.load(Ordering::SeqCst), 1);

        resolver.reset().await;
        assert!(resolver.resolve().await.is_some());
        assert_eq!(book.listings.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remark_name_matching() {
        let book = ContactBook::new(vec![contact("@1", "me", ""), contact("@2", "Someone", "me")]);
        let resolver = ReceiverResolver::new(book, rule(MatchType::RemarkName, "me"));

        assert_eq!(resolver.resolve().await.unwrap().id, "@2");
    }

    #[tokio::test]
    async fn test_miss_is_not_cached() {
        let book = ContactBook::new(vec![contact("@1", "Alice", "")]);
        let resolver = ReceiverResolver::new(Arc::clone(&book) as Arc<dyn MessagingTransport>, rule(MatchType::RemarkName, "Nobody"));

        assert!(resolver.resolve().await.is_none());
        assert!(resolver.resolve().await.is_none());
        assert_eq!(book.listings.load(Ordering::SeqCst), 2);
    }
}
