use crate::config::Settings;
use crate::services::file_materializer::FileMaterializer;
use crate::services::ingestion::STALE_MESSAGE_WINDOW;
use crate::services::shadow_store::{SeenSet, ShadowStore};
use opentelemetry::{global, metrics::Counter};
use std::time::Duration as StdDuration;
use time::{Duration, OffsetDateTime};
use tokio::sync::watch;
use tracing::Instrument;

#[derive(Clone, Debug)]
struct Metrics {
    evicted: Counter<u64>,
    errors: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("shadow-relay");
        Self {
            evicted: meter
                .u64_counter("shadow_records_evicted_total")
                .with_description("Total shadow records evicted after their time-to-live")
                .build(),
            errors: meter
                .u64_counter("shadow_eviction_errors_total")
                .with_description("Total media files that could not be deleted during eviction")
                .build(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: usize,
    pub files_removed: usize,
    pub seen_pruned: usize,
}

#[derive(Debug)]
pub struct ExpirySweeper {
    store: ShadowStore,
    seen: SeenSet,
    ttl: Duration,
    interval: StdDuration,
    metrics: Metrics,
}

impl ExpirySweeper {
    #[must_use]
    pub fn new(store: ShadowStore, seen: SeenSet, settings: &Settings) -> Self {
        Self { store, seen, ttl: settings.message_ttl(), interval: settings.cleanup_interval(), metrics: Metrics::new() }
    }

    /// Sweeps immediately, then again `interval` after each sweep finishes,
    /// until `shutdown` flips. Sweeps never overlap.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut next_tick = tokio::time::Instant::now();

        while !*shutdown.borrow() {
            tokio::select! {
                () = tokio::time::sleep_until(next_tick) => {
                    self.sweep_at(OffsetDateTime::now_utc())
                        .instrument(tracing::info_span!("expiry_sweep_iteration"))
                        .await;
                    next_tick = tokio::time::Instant::now() + self.interval;
                }
                res = shutdown.changed() => {
                    if res.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Expiry sweeper shutting down...");
    }

    /// Evicts every record older than the TTL at `now`, deleting its media
    /// unless a live record shares the file. Failures are logged per entry and
    /// never stop the sweep.
    pub async fn sweep_at(&self, now: OffsetDateTime) -> SweepReport {
        let mut report = SweepReport::default();

        for id in self.store.snapshot_ids() {
            let Some(record) = self.store.remove_if_expired(&id, now, self.ttl) else {
                continue;
            };
            report.evicted += 1;

            if let Some(path) = record.media_path() {
                if self.store.references_path(path) {
                    tracing::debug!(message.id = %id, path = %path.display(), "Media still used by a live record");
                    continue;
                }
                match FileMaterializer::discard(path).await {
                    Ok(true) => report.files_removed += 1,
                    Ok(false) => {}
                    Err(e) => {
                        tracing::error!(error = %e, message.id = %id, path = %path.display(), "Failed to delete media");
                        self.metrics.errors.add(1, &[]);
                    }
                }
            }
        }

        report.seen_pruned = self.seen.prune_older_than(now, STALE_MESSAGE_WINDOW);

        if report.evicted > 0 {
            tracing::debug!(evicted = report.evicted, files_removed = report.files_removed, "Evicted expired records");
            self.metrics.evicted.add(report.evicted as u64, &[]);
        }
        report
    }
}
