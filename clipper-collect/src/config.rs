//! Collection service configuration

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Which gateway implementations the composition root wires up.
/// Mock is an explicit choice; the live adapters never fall back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Live,
    Mock,
}

/// Collection service configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path
    pub database_path: String,
    /// Environment: development | staging | production
    pub environment: String,
    /// How often the scheduler processes due collections (seconds)
    pub scheduler_interval_secs: u64,
    /// How often commission collections are generated for all barbers (seconds)
    pub generation_interval_secs: u64,
    /// Max collections processed per scheduler tick
    pub batch_limit: i64,
    /// live | mock gateway selection
    pub gateway_mode: GatewayMode,
    /// ACH rail API base URL
    pub ach_api_base: String,
    /// ACH rail API token
    pub ach_api_token: String,
    /// Platform-side funding source receiving collected money
    pub platform_funding_source: String,
    /// Card rail API base URL
    pub card_api_base: String,
    /// Card rail secret key
    pub card_secret_key: String,
    /// Platform customer/account namespace on the card rail
    pub platform_card_account: String,
    /// Optional directory for rolling log files
    pub log_dir: Option<String>,
}

impl Config {
    /// Require a secret env var: must be set and non-empty when the live
    /// gateways are in play outside development.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let gateway_mode = match std::env::var("GATEWAY_MODE").as_deref() {
            Ok("live") => GatewayMode::Live,
            Ok("mock") => GatewayMode::Mock,
            Ok(other) => return Err(format!("GATEWAY_MODE must be live or mock, got {other}").into()),
            // Unset: development runs mock, everything else runs live
            Err(_) => {
                if environment == "development" {
                    GatewayMode::Mock
                } else {
                    GatewayMode::Live
                }
            }
        };

        let (ach_api_token, card_secret_key) = if gateway_mode == GatewayMode::Live {
            (
                Self::require_secret("ACH_API_TOKEN", &environment)?,
                Self::require_secret("CARD_SECRET_KEY", &environment)?,
            )
        } else {
            (String::new(), String::new())
        };

        Ok(Self {
            database_path: std::env::var("DATABASE_PATH").unwrap_or_else(|_| "clipper.db".into()),
            scheduler_interval_secs: std::env::var("SCHEDULER_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(900),
            generation_interval_secs: std::env::var("GENERATION_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(86_400),
            batch_limit: std::env::var("BATCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(50),
            gateway_mode,
            ach_api_base: std::env::var("ACH_API_BASE")
                .unwrap_or_else(|_| "https://api.dwolla.com".into()),
            ach_api_token,
            platform_funding_source: std::env::var("PLATFORM_FUNDING_SOURCE").unwrap_or_default(),
            card_api_base: std::env::var("CARD_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".into()),
            card_secret_key,
            platform_card_account: std::env::var("PLATFORM_CARD_ACCOUNT").unwrap_or_default(),
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            environment,
        })
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
