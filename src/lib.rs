#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::MessagingTransport;
use crate::config::Settings;
use crate::services::{FileMaterializer, IngestionPipeline, ReceiverResolver, RevocationMatcher, SeenSet, ShadowStore};
use crate::workers::ExpirySweeper;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[must_use]
pub const fn help_text() -> &'static str {
    "Keeps recent messages for a short while and, when a sender withdraws one, \
     forwards what it said to the configured receiver."
}

/// One running instance: every component shares the same store and seen set.
#[derive(Debug)]
pub struct App {
    pub pipeline: IngestionPipeline,
    pub store: ShadowStore,
    pub seen: SeenSet,
    pub resolver: Arc<ReceiverResolver>,
    pub sweeper: ExpirySweeper,
}

impl App {
    /// Drops all shadowed state and the cached receiver.
    pub async fn reset(&self) {
        self.store.reset();
        self.seen.reset();
        self.resolver.reset().await;
    }
}

#[derive(Debug)]
pub struct AppBuilder {
    settings: Settings,
    transport: Arc<dyn MessagingTransport>,
    download_dir: PathBuf,
}

impl AppBuilder {
    #[must_use]
    pub fn new(settings: Settings, transport: Arc<dyn MessagingTransport>) -> Self {
        Self { settings, transport, download_dir: PathBuf::from("downloads") }
    }

    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    /// Wires the components and empties the download directory.
    ///
    /// # Errors
    /// Returns an error if the download directory cannot be prepared.
    pub async fn build(self) -> error::Result<App> {
        let store = ShadowStore::new();
        let seen = SeenSet::new();

        let materializer = FileMaterializer::new(self.download_dir, Arc::clone(&self.transport));
        materializer.prepare().await?;

        let resolver = Arc::new(ReceiverResolver::new(Arc::clone(&self.transport), self.settings.receiver.clone()));
        let matcher = Arc::new(RevocationMatcher::new(store.clone(), Arc::clone(&resolver), self.transport));
        let pipeline = IngestionPipeline::new(store.clone(), seen.clone(), materializer, matcher);
        let sweeper = ExpirySweeper::new(store.clone(), seen.clone(), &self.settings);

        Ok(App { pipeline, store, seen, resolver, sweeper })
    }
}

/// Flips `shutdown_tx` on Ctrl-C or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {}
            () = terminate => {}
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
