use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CONTRACT_ADDRESS, DEFAULT_CONTRACT_NAME, DEFAULT_STACKS_API_URL, STATS_BATCH_SIZE,
    STATS_CACHE_TTL_SECS, STATS_MAX_TRANSACTIONS, SYNC_INTERVAL_SECS, TX_MOVE_TIMEOUT_SECS,
    TX_POLL_INTERVAL_SECS, TX_POLL_MAX_ATTEMPTS, TX_RESET_TIMEOUT_SECS, TX_STATUS_CLEAR_MS,
};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,

    // Ledger
    pub stacks_api_url: String,
    pub contract_address: String,
    pub contract_name: String,
    pub signer_url: Option<String>,

    // Identity
    pub player_address: Option<String>,
    pub player_side: u8,

    // Sync + lifecycle timers
    pub sync_interval_secs: u64,
    pub tx_poll_interval_secs: u64,
    pub tx_poll_max_attempts: u32,
    pub tx_move_timeout_secs: u64,
    pub tx_reset_timeout_secs: u64,
    pub tx_status_clear_ms: u64,

    // Stats
    pub stats_cache_ttl_secs: u64,
    pub stats_batch_size: usize,
    pub stats_max_transactions: usize,

    // Cache store
    pub cache_backend: String,
    pub cache_dir: String,
    pub redis_url: String,

    // CORS
    pub cors_allowed_origins: String,
}

/// Timing for the steady-state reconciliation loop.
#[derive(Debug, Clone, Copy)]
pub struct SyncSettings {
    pub interval: Duration,
}

/// Bounded confirmation policy for in-flight transactions.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleSettings {
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
    pub move_timeout: Duration,
    pub reset_timeout: Duration,
    pub status_clear_delay: Duration,
}

#[derive(Debug, Clone, Copy)]
pub struct StatsSettings {
    pub cache_ttl: Duration,
    pub batch_size: usize,
    pub max_transactions: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(SYNC_INTERVAL_SECS),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(TX_POLL_INTERVAL_SECS),
            max_poll_attempts: TX_POLL_MAX_ATTEMPTS,
            move_timeout: Duration::from_secs(TX_MOVE_TIMEOUT_SECS),
            reset_timeout: Duration::from_secs(TX_RESET_TIMEOUT_SECS),
            status_clear_delay: Duration::from_millis(TX_STATUS_CLEAR_MS),
        }
    }
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(STATS_CACHE_TTL_SECS),
            batch_size: STATS_BATCH_SIZE,
            max_transactions: STATS_MAX_TRANSACTIONS,
        }
    }
}

// Internal helper that supports `env_non_empty` operations.
fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),

            stacks_api_url: env::var("STACKS_API_URL")
                .unwrap_or_else(|_| DEFAULT_STACKS_API_URL.to_string()),
            contract_address: env::var("CONTRACT_ADDRESS")
                .unwrap_or_else(|_| DEFAULT_CONTRACT_ADDRESS.to_string()),
            contract_name: env::var("CONTRACT_NAME")
                .unwrap_or_else(|_| DEFAULT_CONTRACT_NAME.to_string()),
            signer_url: env_non_empty("SIGNER_URL"),

            player_address: env_non_empty("PLAYER_ADDRESS"),
            player_side: env::var("PLAYER_SIDE")
                .unwrap_or_else(|_| "1".to_string())
                .parse()?,

            sync_interval_secs: env::var("SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| SYNC_INTERVAL_SECS.to_string())
                .parse()?,
            tx_poll_interval_secs: env::var("TX_POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| TX_POLL_INTERVAL_SECS.to_string())
                .parse()?,
            tx_poll_max_attempts: env::var("TX_POLL_MAX_ATTEMPTS")
                .unwrap_or_else(|_| TX_POLL_MAX_ATTEMPTS.to_string())
                .parse()?,
            tx_move_timeout_secs: env::var("TX_MOVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| TX_MOVE_TIMEOUT_SECS.to_string())
                .parse()?,
            tx_reset_timeout_secs: env::var("TX_RESET_TIMEOUT_SECS")
                .unwrap_or_else(|_| TX_RESET_TIMEOUT_SECS.to_string())
                .parse()?,
            tx_status_clear_ms: env::var("TX_STATUS_CLEAR_MS")
                .unwrap_or_else(|_| TX_STATUS_CLEAR_MS.to_string())
                .parse()?,

            stats_cache_ttl_secs: env::var("STATS_CACHE_TTL_SECS")
                .unwrap_or_else(|_| STATS_CACHE_TTL_SECS.to_string())
                .parse()?,
            stats_batch_size: env::var("STATS_BATCH_SIZE")
                .unwrap_or_else(|_| STATS_BATCH_SIZE.to_string())
                .parse()?,
            stats_max_transactions: env::var("STATS_MAX_TRANSACTIONS")
                .unwrap_or_else(|_| STATS_MAX_TRANSACTIONS.to_string())
                .parse()?,

            cache_backend: env::var("CACHE_BACKEND").unwrap_or_else(|_| "file".to_string()),
            cache_dir: env::var("CACHE_DIR").unwrap_or_else(|_| ".clarityxo-cache".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".to_string()),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.stacks_api_url.trim().is_empty() {
            anyhow::bail!("STACKS_API_URL is empty");
        }
        url::Url::parse(&self.stacks_api_url)
            .map_err(|e| anyhow::anyhow!("STACKS_API_URL is invalid: {}", e))?;
        if self.contract_address.trim().is_empty() || self.contract_name.trim().is_empty() {
            anyhow::bail!("CONTRACT_ADDRESS and CONTRACT_NAME must be set");
        }
        if self.player_side != 1 && self.player_side != 2 {
            anyhow::bail!("PLAYER_SIDE must be 1 (X) or 2 (O)");
        }
        if self.sync_interval_secs == 0 || self.tx_poll_interval_secs == 0 {
            anyhow::bail!("Sync and poll intervals must be > 0");
        }
        if self.tx_poll_max_attempts == 0 {
            anyhow::bail!("TX_POLL_MAX_ATTEMPTS must be > 0");
        }
        if self.stats_batch_size == 0 || self.stats_max_transactions == 0 {
            anyhow::bail!("Stats batch size and transaction cap must be > 0");
        }
        if !matches!(self.cache_backend.as_str(), "file" | "redis" | "memory") {
            anyhow::bail!("CACHE_BACKEND must be one of: file, redis, memory");
        }

        if self.contract_address == DEFAULT_CONTRACT_ADDRESS {
            tracing::warn!("Using placeholder contract address {}", self.contract_address);
        }
        if self.signer_url.is_none() {
            tracing::warn!("SIGNER_URL not set; moves and resets will be rejected");
        }
        if self.player_address.is_none() {
            tracing::warn!("PLAYER_ADDRESS not set; personalized stats are unavailable");
        }
        if self.stats_batch_size > self.stats_max_transactions {
            tracing::warn!("STATS_BATCH_SIZE exceeds STATS_MAX_TRANSACTIONS; only one page will be read");
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    pub fn is_testnet(&self) -> bool {
        if self.environment == "development" || self.environment == "testnet" {
            return true;
        }
        // Stacks testnet principals start with ST / SN
        self.contract_address.starts_with("ST") || self.contract_address.starts_with("SN")
    }

    pub fn network_name(&self) -> &'static str {
        if self.is_testnet() {
            "testnet"
        } else {
            "mainnet"
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            interval: Duration::from_secs(self.sync_interval_secs),
        }
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            poll_interval: Duration::from_secs(self.tx_poll_interval_secs),
            max_poll_attempts: self.tx_poll_max_attempts,
            move_timeout: Duration::from_secs(self.tx_move_timeout_secs),
            reset_timeout: Duration::from_secs(self.tx_reset_timeout_secs),
            status_clear_delay: Duration::from_millis(self.tx_status_clear_ms),
        }
    }

    pub fn stats_settings(&self) -> StatsSettings {
        StatsSettings {
            cache_ttl: Duration::from_secs(self.stats_cache_ttl_secs),
            batch_size: self.stats_batch_size,
            max_transactions: self.stats_max_transactions,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "development".to_string(),
        stacks_api_url: "http://localhost:3999".to_string(),
        contract_address: "ST30VGN68PSGVWGNMD0HH2WQMM5T486EK3WBNTHCY".to_string(),
        contract_name: "tictactoe".to_string(),
        signer_url: None,
        player_address: Some("ST2PLAYER0000000000000000000000000000ABCD".to_string()),
        player_side: 1,
        sync_interval_secs: SYNC_INTERVAL_SECS,
        tx_poll_interval_secs: TX_POLL_INTERVAL_SECS,
        tx_poll_max_attempts: TX_POLL_MAX_ATTEMPTS,
        tx_move_timeout_secs: TX_MOVE_TIMEOUT_SECS,
        tx_reset_timeout_secs: TX_RESET_TIMEOUT_SECS,
        tx_status_clear_ms: TX_STATUS_CLEAR_MS,
        stats_cache_ttl_secs: STATS_CACHE_TTL_SECS,
        stats_batch_size: STATS_BATCH_SIZE,
        stats_max_transactions: STATS_MAX_TRANSACTIONS,
        cache_backend: "memory".to_string(),
        cache_dir: ".clarityxo-cache".to_string(),
        redis_url: "redis://localhost:6379".to_string(),
        cors_allowed_origins: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_side() {
        let mut config = test_config();
        config.player_side = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch() {
        let mut config = test_config();
        config.stats_batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_cache_backend() {
        let mut config = test_config();
        config.cache_backend = "sqlite".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn lifecycle_settings_follow_config() {
        let mut config = test_config();
        config.tx_move_timeout_secs = 20;
        config.tx_poll_max_attempts = 4;
        let settings = config.lifecycle_settings();
        assert_eq!(settings.move_timeout, Duration::from_secs(20));
        assert_eq!(settings.max_poll_attempts, 4);
        assert_eq!(settings.reset_timeout, Duration::from_secs(TX_RESET_TIMEOUT_SECS));
    }

    #[test]
    fn testnet_detected_from_environment() {
        let mut config = test_config();
        assert_eq!(config.network_name(), "testnet");
        config.environment = "production".to_string();
        config.contract_address = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7".to_string();
        assert_eq!(config.network_name(), "mainnet");
    }
}
