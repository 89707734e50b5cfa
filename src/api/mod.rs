pub mod game;
pub mod health;
pub mod leaderboard;
pub mod stats;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::ledger::LedgerGateway;
use crate::services::{ServiceHandles, StatsAggregator, SyncEngine, TxLifecycleController};
use crate::session::SessionContext;

#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<SyncEngine>,
    pub lifecycle: Arc<TxLifecycleController>,
    pub stats: Arc<StatsAggregator>,
    pub gateway: Arc<dyn LedgerGateway>,
    pub session: SessionContext,
    pub config: Config,
}

impl AppState {
    pub fn new(
        services: &ServiceHandles,
        gateway: Arc<dyn LedgerGateway>,
        session: SessionContext,
        config: Config,
    ) -> Self {
        Self {
            sync: services.sync.clone(),
            lifecycle: services.lifecycle.clone(),
            stats: services.stats.clone(),
            gateway,
            session,
            config,
        }
    }
}

pub fn require_player(state: &AppState) -> Result<&str> {
    state
        .session
        .player_address()
        .ok_or_else(|| AppError::NotFound("No player identity. Set PLAYER_ADDRESS.".to_string()))
}

#[cfg(test)]
pub(crate) fn test_state(fake: Arc<crate::ledger::fakes::FakeLedger>) -> AppState {
    use crate::services::cache_store::MemoryCacheStore;
    use crate::utils::SystemClock;

    let config = crate::config::test_config();
    let session = SessionContext::from_config(&config);
    let sync = Arc::new(SyncEngine::new(fake.clone(), config.sync_settings()));
    let lifecycle = Arc::new(TxLifecycleController::new(
        fake.clone(),
        sync.clone(),
        session.clone(),
        config.lifecycle_settings(),
    ));
    let stats = Arc::new(StatsAggregator::new(
        fake.clone(),
        Arc::new(MemoryCacheStore::new()),
        Arc::new(SystemClock),
        config.stats_settings(),
    ));
    AppState {
        sync,
        lifecycle,
        stats,
        gateway: fake,
        session,
        config,
    }
}
