use anyhow::{Context, Result};
use std::env;
use std::time::Duration;
use watchlist_gateway::{GatewayConfig, QuoteEndpoint};
use watchlist_sync::SyncConfig;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Account whose watchlist is synced
    pub user_id: String,
    pub gateway: GatewayConfig,
    pub sync: SyncConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let request_timeout = Duration::from_secs(
            env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("REQUEST_TIMEOUT_SECS must be a whole number of seconds")?,
        );

        let gateway = GatewayConfig {
            base_url: env::var("WATCHLIST_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            request_timeout,
            quote_endpoint: env::var("WATCHLIST_QUOTE_ENDPOINT")
                .unwrap_or_else(|_| "stockprice".to_string())
                .parse::<QuoteEndpoint>()?,
            suggestion_limit: env::var("SUGGESTION_LIMIT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("SUGGESTION_LIMIT must be a positive integer")?,
        };

        let sync = SyncConfig {
            refresh_interval: Duration::from_secs(
                env::var("REFRESH_INTERVAL_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("REFRESH_INTERVAL_SECS must be a whole number of seconds")?,
            ),
            request_timeout,
            reorder_debounce: Duration::from_millis(
                env::var("REORDER_DEBOUNCE_MS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("REORDER_DEBOUNCE_MS must be a whole number of milliseconds")?,
            ),
            search_debounce: Duration::from_millis(
                env::var("SEARCH_DEBOUNCE_MS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("SEARCH_DEBOUNCE_MS must be a whole number of milliseconds")?,
            ),
            notice_ttl: Duration::from_secs(
                env::var("NOTICE_TTL_SECS")
                    .unwrap_or_else(|_| "4".to_string())
                    .parse()
                    .context("NOTICE_TTL_SECS must be a whole number of seconds")?,
            ),
            ..SyncConfig::default()
        };

        let config = Self {
            user_id: env::var("WATCHLIST_USER_ID").context("WATCHLIST_USER_ID not set")?,
            gateway,
            sync,
        };
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.user_id.trim().is_empty() {
            anyhow::bail!("WATCHLIST_USER_ID is empty");
        }
        if self.sync.refresh_interval.is_zero() {
            anyhow::bail!("REFRESH_INTERVAL_SECS must be greater than 0");
        }
        if self.gateway.request_timeout.is_zero() {
            anyhow::bail!("REQUEST_TIMEOUT_SECS must be greater than 0");
        }
        if self.gateway.suggestion_limit == 0 {
            anyhow::bail!("SUGGESTION_LIMIT must be greater than 0");
        }
        Ok(())
    }
}
