//! clipper-collect — platform collection engine
//!
//! Long-running service that:
//! - Generates commission collections from the external transaction ledger
//! - Debits commission and booth rent over the configured payment rail
//! - Retries transient failures with exponential backoff
//! - Reconciles webhook-delivered final transfer statuses

use tokio_util::sync::CancellationToken;

use clipper_collect::config::Config;
use clipper_collect::state::AppState;
use clipper_collect::worker::CollectionWorker;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    clipper_collect::logger::init_logger(config.log_dir.as_deref());

    tracing::info!("Starting clipper-collect (env: {})", config.environment);

    // Initialize application state
    let state = AppState::new(&config).await?;

    let shutdown = CancellationToken::new();
    let worker = CollectionWorker::new(state, shutdown.clone());
    let worker_handle = tokio::spawn(worker.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
    worker_handle.await?;

    Ok(())
}
