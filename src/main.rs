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

use shadow_relay::adapters::{LocalTransport, local};
use shadow_relay::config::{Config, Settings};
use shadow_relay::{AppBuilder, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot");
    let app = async {
        let settings = Settings::load_or_init(&config.settings_path);
        let contacts = local::load_contacts(config.contacts_path.as_deref()).await?;
        let transport = Arc::new(LocalTransport::stdout(contacts));

        let app = AppBuilder::new(settings, transport).with_download_dir(&config.download_dir).build().await?;
        tracing::info!(download_dir = %config.download_dir.display(), "{}", shadow_relay::help_text());
        Ok::<_, anyhow::Error>(app)
    }
    .instrument(boot_span)
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    shadow_relay::spawn_signal_handler(shutdown_tx.clone());

    let sweeper_task = tokio::spawn(app.sweeper.run(shutdown_rx.clone()));

    let handled = local::pump_events(BufReader::new(tokio::io::stdin()), &app.pipeline, shutdown_rx).await;
    tracing::info!(handled, "Event stream closed");

    let _ = shutdown_tx.send(true);
    tokio::select! {
        res = sweeper_task => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Expiry sweeper task failed");
            }
        }
        () = tokio::time::sleep(Duration::from_secs(config.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
