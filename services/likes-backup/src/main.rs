//!
//! src/main.rs  Andrew Belles  Oct 17th, 2026
//!
//! Entry point of the liked-tracks backup. Wires configuration,
//! logging, the Yandex Music client and the csv snapshot together
//! and runs a single refresh
//!

mod config;
mod errors;
mod logging;

mod fetch;
mod reconcile;
mod refresh;
mod report;
mod snapshot;
mod types;

use clap::Parser;

use crate::errors::BackupError;

#[tokio::main]
async fn main() -> Result<(), BackupError> {
    dotenvy::dotenv().ok();

    let cli  = config::Cli::parse();
    let cfgs = config::load_config(&cli)?;
    let _log = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "likes-backup",
        version = %env!("CARGO_PKG_VERSION"),
        owner = %cfgs.owner,
        snapshot = %cfgs.snapshot.path.display(),
        proxy = ?cfgs.yandex.proxy.as_ref().map(|u| u.as_str()),
        playlist = ?cfgs.yandex.playlist,
        "starting"
    );

    let client = fetch::YandexMusicClient::new(&cfgs.http, &cfgs.yandex)?;
    let store  = snapshot::CsvSnapshot::new();

    let outcome = refresh::refresh(
        &client,
        &store,
        &cfgs.owner,
        &cfgs.snapshot.path,
        types::observed_now
    ).await;

    match outcome {
        Ok(outcome) => {
            report::log_report(&outcome);
            Ok(())
        },
        Err(e) => {
            tracing::error!(error = %e, "refresh.failed");
            Err(e)
        }
    }
}
