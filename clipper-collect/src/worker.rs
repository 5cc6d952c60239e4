//! CollectionWorker — background scheduler for the collection engine
//!
//! Stands in for an external cron: processes due collections on a short
//! interval and sweeps commission generation on a long one. Per-tick
//! failures are logged and never stop the loop.

use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

pub struct CollectionWorker {
    state: AppState,
    shutdown: CancellationToken,
}

impl CollectionWorker {
    pub fn new(state: AppState, shutdown: CancellationToken) -> Self {
        Self { state, shutdown }
    }

    /// Run the collection worker
    ///
    /// 1. Commission generation sweep on startup
    /// 2. Process due collections every scheduler interval
    /// 3. Regenerate commission collections every generation interval
    pub async fn run(self) {
        tracing::info!(
            scheduler_interval_secs = self.state.config.scheduler_interval_secs,
            generation_interval_secs = self.state.config.generation_interval_secs,
            "CollectionWorker started"
        );

        let service = self.state.collection_service();

        // Initial sweep so a fresh deployment picks up outstanding work
        if let Err(e) = service.generate_commission_collections(None).await {
            tracing::error!("Initial commission generation failed: {e}");
        }

        let mut process_interval =
            tokio::time::interval(Duration::from_secs(self.state.config.scheduler_interval_secs));
        let mut generation_interval = tokio::time::interval(Duration::from_secs(
            self.state.config.generation_interval_secs,
        ));
        process_interval.tick().await; // skip immediate tick
        generation_interval.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("CollectionWorker shutting down");
                    break;
                }

                _ = process_interval.tick() => {
                    match service.process_scheduled_collections(self.state.config.batch_limit).await {
                        Ok(results) if results.is_empty() => {}
                        Ok(results) => {
                            let failed = results.iter().filter(|r| !r.success).count();
                            tracing::info!(
                                processed = results.len(),
                                failed,
                                "Scheduler tick complete"
                            );
                        }
                        Err(e) => tracing::error!("Scheduled collection run failed: {e}"),
                    }
                }

                _ = generation_interval.tick() => {
                    if let Err(e) = service.generate_commission_collections(None).await {
                        tracing::error!("Commission generation sweep failed: {e}");
                    }
                }
            }
        }

        tracing::info!("CollectionWorker stopped");
    }
}
