// Client-side services
pub mod cache_store;
pub mod stats_aggregator;
pub mod sync_engine;
pub mod tx_lifecycle;

pub use cache_store::{cache_store_from_config, CacheStore};
pub use stats_aggregator::StatsAggregator;
pub use sync_engine::SyncEngine;
pub use tx_lifecycle::TxLifecycleController;

use crate::{config::Config, ledger::LedgerGateway, session::SessionContext, utils::SystemClock};
use std::sync::Arc;

// Internal helper that checks conditions for `is_env_flag_enabled`.
fn is_env_flag_enabled(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
        })
        .unwrap_or(false)
}

/// Running components, shared with the HTTP layer.
#[derive(Clone)]
pub struct ServiceHandles {
    pub sync: Arc<SyncEngine>,
    pub lifecycle: Arc<TxLifecycleController>,
    pub stats: Arc<StatsAggregator>,
}

impl ServiceHandles {
    /// Cancel every timer. In-flight ledger requests are left to finish.
    pub async fn shutdown(&self) {
        tracing::info!("Stopping background services...");
        self.lifecycle.shutdown();
        self.sync.shutdown().await;
        tracing::info!("Background services stopped");
    }
}

/// Build the components and start the steady-state refresh loop
pub fn start_background_services(
    gateway: Arc<dyn LedgerGateway>,
    store: Arc<dyn CacheStore>,
    session: SessionContext,
    config: &Config,
) -> ServiceHandles {
    tracing::info!("Starting background services...");

    let sync = Arc::new(SyncEngine::new(gateway.clone(), config.sync_settings()));
    sync.start();

    let lifecycle = Arc::new(TxLifecycleController::new(
        gateway.clone(),
        sync.clone(),
        session,
        config.lifecycle_settings(),
    ));

    let stats = Arc::new(StatsAggregator::new(
        gateway,
        store,
        Arc::new(SystemClock),
        config.stats_settings(),
    ));

    let warm_stats = if std::env::var("WARM_STATS_CACHE").is_ok() {
        is_env_flag_enabled("WARM_STATS_CACHE")
    } else {
        true
    };
    if warm_stats {
        let stats = stats.clone();
        tokio::spawn(async move {
            let snapshot = stats.fetch_player_stats(false).await;
            tracing::info!(
                "Stats cache warmed ({} players)",
                snapshot.stats_by_address.len()
            );
        });
    } else {
        tracing::warn!("Stats warm-up disabled via WARM_STATS_CACHE");
    }

    tracing::info!("All background services started successfully");

    ServiceHandles {
        sync,
        lifecycle,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fakes::FakeLedger;
    use crate::services::cache_store::MemoryCacheStore;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn services_start_and_stop() {
        let fake = Arc::new(FakeLedger::new());
        let config = crate::config::test_config();
        let services = start_background_services(
            fake.clone(),
            Arc::new(MemoryCacheStore::new()),
            SessionContext::from_config(&config),
            &config,
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(services.sync.is_running());
        assert!(fake.reads() >= 1);

        services.shutdown().await;
        assert!(!services.sync.is_running());
    }

    #[test]
    fn env_flag_parsing_accepts_common_truthy_values() {
        std::env::set_var("CLARITYXO_TEST_FLAG", "Yes");
        assert!(is_env_flag_enabled("CLARITYXO_TEST_FLAG"));
        std::env::set_var("CLARITYXO_TEST_FLAG", "0");
        assert!(!is_env_flag_enabled("CLARITYXO_TEST_FLAG"));
        std::env::remove_var("CLARITYXO_TEST_FLAG");
        assert!(!is_env_flag_enabled("CLARITYXO_TEST_FLAG"));
    }
}
