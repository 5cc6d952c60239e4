//! Application state
//!
//! The composition root: owns the pool and the gateway router, and hands
//! out [`CollectionService`] instances. All services are constructed here
//! explicitly; nothing materializes as a module-import side effect.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::collection::CollectionService;
use crate::config::{Config, GatewayMode};
use crate::db;
use crate::gateway::{AchGateway, CardGateway, GatewayRouter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state (cheap to clone)
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection pool
    pub pool: SqlitePool,
    /// Service configuration
    pub config: Config,
    /// Payment rail adapters, selected by config at startup
    pub gateways: GatewayRouter,
}

impl AppState {
    /// Create a new AppState: open the database, apply migrations, wire
    /// the gateway adapters per configuration.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = db::connect(&config.database_path).await?;

        let gateways = match config.gateway_mode {
            GatewayMode::Mock => {
                tracing::warn!("Gateway mode: mock, debits are no-ops, no money will move");
                GatewayRouter::null()
            }
            GatewayMode::Live => GatewayRouter::new(
                Arc::new(AchGateway::new(
                    config.ach_api_base.clone(),
                    config.ach_api_token.clone(),
                    config.platform_funding_source.clone(),
                )),
                Arc::new(CardGateway::new(
                    config.card_api_base.clone(),
                    config.card_secret_key.clone(),
                    config.platform_card_account.clone(),
                )),
            ),
        };

        Ok(Self {
            pool,
            config: config.clone(),
            gateways,
        })
    }

    /// Build a collection service over this state
    pub fn collection_service(&self) -> CollectionService {
        CollectionService::new(self.pool.clone(), self.gateways.clone())
    }
}
