#![allow(dead_code)]

use async_trait::async_trait;
use shadow_relay::adapters::{MessagingTransport, TransportError};
use shadow_relay::config::{ReceiverSettings, Settings};
use shadow_relay::domain::{Contact, EventKind, InboundEvent, MatchType, REVOCATION_MARKER, ReceiverHandle};
use shadow_relay::{App, AppBuilder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use time::OffsetDateTime;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("shadow_relay=debug".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().init();
    });
}

/// Collects formatted log lines emitted on the current thread.
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Routes this thread's events into the buffer until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(move || sink.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).lines().filter(|line| line.contains(level)).map(str::to_string).collect()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { to: String, text: String },
    Image { to: String, path: PathBuf },
    Video { to: String, path: PathBuf },
    File { to: String, path: PathBuf },
}

/// Records every send; media downloads write the source reference as bytes.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub contacts: Vec<Contact>,
    pub fail_sends: AtomicBool,
    pub fail_downloads: AtomicBool,
    pub downloads: AtomicUsize,
    pub listings: AtomicUsize,
    sent: Mutex<Vec<Sent>>,
}

impl RecordingTransport {
    pub fn with_contacts(contacts: Vec<Contact>) -> Self {
        Self { contacts, ..Self::default() }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, sent: Sent) -> Result<(), TransportError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed { target: "test".into(), reason: "offline".into() });
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl MessagingTransport for RecordingTransport {
    async fn list_contacts(&self) -> Result<Vec<Contact>, TransportError> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.contacts.clone())
    }

    async fn send_text(&self, target: &ReceiverHandle, text: &str) -> Result<(), TransportError> {
        self.record(Sent::Text { to: target.id.clone(), text: text.to_string() })
    }

    async fn send_image(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError> {
        self.record(Sent::Image { to: target.id.clone(), path: path.to_path_buf() })
    }

    async fn send_video(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError> {
        self.record(Sent::Video { to: target.id.clone(), path: path.to_path_buf() })
    }

    async fn send_file(&self, target: &ReceiverHandle, path: &Path) -> Result<(), TransportError> {
        self.record(Sent::File { to: target.id.clone(), path: path.to_path_buf() })
    }

    async fn download_media(&self, source: &str, destination: &Path) -> Result<(), TransportError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_downloads.load(Ordering::SeqCst) {
            tokio::fs::write(destination, b"partial").await?;
            return Err(TransportError::Other(anyhow::anyhow!("connection reset mid-download")));
        }
        tokio::fs::write(destination, source.as_bytes()).await?;
        Ok(())
    }
}

pub const RELAY_ID: &str = "@relay";

pub fn relay_contacts() -> Vec<Contact> {
    vec![
        Contact { id: "@alice".into(), display_name: "Alice".into(), remark_name: String::new() },
        Contact { id: RELAY_ID.into(), display_name: "Relay".into(), remark_name: "me".into() },
    ]
}

pub fn test_settings() -> Settings {
    Settings {
        receiver: ReceiverSettings { match_type: MatchType::Nickname, name: "Relay".into() },
        message_expire_secs: 120,
        cleanup_interval_secs: 2,
    }
}

/// An app over a recording transport, with its own download directory that
/// is removed on drop.
#[derive(Debug)]
pub struct Harness {
    pub app: App,
    pub transport: Arc<RecordingTransport>,
    pub dir: PathBuf,
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.dir);
    }
}

pub async fn harness_with(settings: Settings, contacts: Vec<Contact>) -> Harness {
    setup_tracing();
    let dir = std::env::temp_dir().join(format!("shadow-relay-test-{}", Uuid::new_v4()));
    let transport = Arc::new(RecordingTransport::with_contacts(contacts));

    let app = AppBuilder::new(settings, Arc::clone(&transport) as Arc<dyn MessagingTransport>)
        .with_download_dir(&dir)
        .build()
        .await
        .expect("Failed to build app");

    Harness { app, transport, dir }
}

pub async fn harness() -> Harness {
    harness_with(test_settings(), relay_contacts()).await
}

pub fn t0() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
}

pub fn secs(n: i64) -> time::Duration {
    time::Duration::seconds(n)
}

pub fn event(id: &str, kind: EventKind, content: &str, created_at: OffsetDateTime) -> InboundEvent {
    InboundEvent {
        id: id.into(),
        kind,
        created_at,
        content: content.into(),
        sender_display_name: "Alice".into(),
        sender_actual_name: String::new(),
        is_group: false,
    }
}

pub fn text_event(id: &str, body: &str, created_at: OffsetDateTime) -> InboundEvent {
    event(id, EventKind::Text, body, created_at)
}

pub fn revocation_note(referenced_id: &str, created_at: OffsetDateTime) -> InboundEvent {
    let raw = format!(
        "<sysmsg type=\"revokemsg\"><revokemsg><msgid>{referenced_id}</msgid><replacemsg><![CDATA[\"Alice\" {REVOCATION_MARKER}]]></replacemsg></revokemsg></sysmsg>"
    );
    event(&format!("note-{referenced_id}"), EventKind::Note, &raw, created_at)
}
