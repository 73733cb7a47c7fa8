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

use post_courier::adapters::database::{self, PgPostStore, PostRepository};
use post_courier::config::{Command, Config};
use post_courier::workers::DeliveryWorker;
use post_courier::{spawn_signal_handler, telemetry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let result = match config.command.unwrap_or_default() {
        Command::Once => run_once(&config).await,
        Command::Watch => run_watch(&config).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = ?e, "Fatal error in scheduled post delivery");
    }

    telemetry_guard.shutdown();
    result
}

async fn build_worker(config: &Config) -> anyhow::Result<DeliveryWorker> {
    async {
        let pool = database::connect_with_retry(&config.database).await?;
        database::run_migrations(&pool).await?;

        let store = Arc::new(PgPostStore::new(pool, PostRepository::new()));
        Ok::<_, anyhow::Error>(DeliveryWorker::new(store, config.delivery.clone()))
    }
    .instrument(tracing::info_span!("boot_worker"))
    .await
}

async fn run_once(config: &Config) -> anyhow::Result<()> {
    let worker = build_worker(config).await?;
    let report = worker.perform_sweep().await?;
    tracing::info!(
        found = report.found,
        delivered = report.delivered,
        missed = report.missed,
        "Completed scheduled post delivery task"
    );
    Ok(())
}

async fn run_watch(config: &Config) -> anyhow::Result<()> {
    let worker = build_worker(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let mut handle = tokio::spawn(worker.run(shutdown_rx.clone()));

    let mut signal_rx = shutdown_rx;
    tokio::select! {
        res = &mut handle => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Delivery worker terminated unexpectedly");
            }
            return Ok(());
        }
        _ = signal_rx.wait_for(|&s| s) => {}
    }

    tokio::select! {
        res = handle => {
            if let Err(e) = res {
                tracing::error!(error = %e, "Delivery worker panicked during shutdown");
            }
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(Duration::from_secs(config.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    Ok(())
}
