use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    config::StatsSettings,
    constants::{STATS_CACHE_KEY, STATS_CACHE_VERSION, WIN_RATE_MIN_GAMES},
    error::Result,
    ledger::{history::parse_game_record, LedgerGateway},
    models::{GameRecord, Outcome, PlayerStats, SortBy, StatsByAddress, StatsSnapshot},
    utils::{format_address, Clock},
};

use super::cache_store::CacheStore;

/// Persisted form of the stats cache.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    /// Unix milliseconds.
    cached_at: i64,
    stats: StatsByAddress,
    games: Vec<GameRecord>,
}

struct CachedStats {
    snapshot: Arc<StatsSnapshot>,
    cached_at_ms: i64,
}

/// Rebuilds per-player stats from contract history behind a TTL cache.
pub struct StatsAggregator {
    gateway: Arc<dyn LedgerGateway>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    settings: StatsSettings,
    memory: RwLock<Option<CachedStats>>,
}

impl StatsAggregator {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        settings: StatsSettings,
    ) -> Self {
        Self {
            gateway,
            store,
            clock,
            settings,
            memory: RwLock::new(None),
        }
    }

    /// Stats for every player seen in recent history.
    ///
    /// Served from cache while it is younger than the TTL unless
    /// `force_refresh` is set. Never fails: history problems shrink the
    /// result instead.
    pub async fn fetch_player_stats(&self, force_refresh: bool) -> Arc<StatsSnapshot> {
        if !force_refresh {
            if let Some(snapshot) = self.load_cached().await {
                tracing::debug!("Stats cache hit ({} players)", snapshot.stats_by_address.len());
                return snapshot;
            }
        }

        let (transactions, complete) = self.fetch_history().await;
        let games = parse_records(&transactions);
        let stats_by_address = aggregate_stats(&games);
        tracing::info!(
            "Aggregated {} games for {} players from {} transactions",
            games.len(),
            stats_by_address.len(),
            transactions.len()
        );

        let snapshot = Arc::new(StatsSnapshot {
            stats_by_address,
            games,
        });

        if complete {
            self.save_cache(snapshot.clone()).await;
        } else {
            tracing::warn!("History fetch incomplete, serving partial stats without caching");
        }
        snapshot
    }

    pub async fn leaderboard(&self, sort_by: SortBy) -> Vec<PlayerStats> {
        let snapshot = self.fetch_player_stats(false).await;
        get_leaderboard(&snapshot.stats_by_address, sort_by)
    }

    pub async fn clear_stats_cache(&self) -> Result<()> {
        *self.memory.write().await = None;
        self.store.remove(STATS_CACHE_KEY).await
    }

    fn is_fresh(&self, cached_at_ms: i64, now_ms: i64) -> bool {
        let age = now_ms - cached_at_ms;
        let ttl = self.settings.cache_ttl.as_millis() as i64;
        age >= 0 && age < ttl
    }

    async fn load_cached(&self) -> Option<Arc<StatsSnapshot>> {
        let now = self.clock.now_millis();

        if let Some(cached) = self.memory.read().await.as_ref() {
            if self.is_fresh(cached.cached_at_ms, now) {
                return Some(cached.snapshot.clone());
            }
        }

        let raw = match self.store.get(STATS_CACHE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!("Stats cache read failed: {}", err);
                return None;
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!("Ignoring corrupt stats cache: {}", err);
                return None;
            }
        };
        if envelope.version != STATS_CACHE_VERSION {
            tracing::warn!(
                "Ignoring stats cache version {} (expected {})",
                envelope.version,
                STATS_CACHE_VERSION
            );
            return None;
        }
        if !self.is_fresh(envelope.cached_at, now) {
            return None;
        }

        let snapshot = Arc::new(StatsSnapshot {
            stats_by_address: envelope.stats,
            games: envelope.games,
        });
        *self.memory.write().await = Some(CachedStats {
            snapshot: snapshot.clone(),
            cached_at_ms: envelope.cached_at,
        });
        Some(snapshot)
    }

    async fn save_cache(&self, snapshot: Arc<StatsSnapshot>) {
        let cached_at = self.clock.now_millis();
        let envelope = CacheEnvelope {
            version: STATS_CACHE_VERSION,
            cached_at,
            stats: snapshot.stats_by_address.clone(),
            games: snapshot.games.clone(),
        };

        *self.memory.write().await = Some(CachedStats {
            snapshot,
            cached_at_ms: cached_at,
        });

        match serde_json::to_string(&envelope) {
            Ok(raw) => {
                if let Err(err) = self.store.set(STATS_CACHE_KEY, &raw).await {
                    tracing::error!("Failed to persist stats cache: {}", err);
                }
            }
            Err(err) => tracing::error!("Failed to serialize stats cache: {}", err),
        }
    }

    /// Page through history. The flag is false when a page failed and the
    /// list is only a prefix.
    async fn fetch_history(&self) -> (Vec<Value>, bool) {
        let batch_size = self.settings.batch_size.max(1);
        let max = self.settings.max_transactions;
        let mut transactions = Vec::new();
        let mut offset = 0usize;

        while offset < max {
            let limit = batch_size.min(max - offset);
            match self.gateway.list_transactions(limit, offset).await {
                Ok(page) => {
                    let len = page.len();
                    transactions.extend(page);
                    if len < limit {
                        break;
                    }
                    offset += limit;
                }
                Err(err) => {
                    tracing::warn!("History page at offset {} failed: {}", offset, err);
                    return (transactions, false);
                }
            }
        }
        (transactions, true)
    }
}

/// Parse raw history into game records, skipping malformed entries and
/// repeated transaction ids.
pub fn parse_records(transactions: &[Value]) -> Vec<GameRecord> {
    let mut seen = HashSet::new();
    let mut games = Vec::new();
    for raw in transactions {
        match parse_game_record(raw) {
            Ok(Some(record)) => {
                if seen.insert(record.tx_id.clone()) {
                    games.push(record);
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!("Skipping history record: {}", err),
        }
    }
    games
}

pub fn aggregate_stats(games: &[GameRecord]) -> StatsByAddress {
    let mut stats = StatsByAddress::new();
    for game in games {
        let entry = stats
            .entry(game.player_address.clone())
            .or_insert_with(|| PlayerStats::new(&game.player_address));
        entry.games_played += 1;
        match game.outcome {
            Outcome::Win => entry.wins += 1,
            Outcome::Loss => entry.losses += 1,
            Outcome::Draw => entry.draws += 1,
        }
        entry.last_played_at = entry.last_played_at.max(game.timestamp);
    }
    for entry in stats.values_mut() {
        entry.win_rate = if entry.games_played > 0 {
            entry.wins as f64 / entry.games_played as f64 * 100.0
        } else {
            0.0
        };
    }
    stats
}

fn qualifies_for_win_rate(stats: &PlayerStats) -> bool {
    stats.games_played >= WIN_RATE_MIN_GAMES
}

fn compare_players(a: &PlayerStats, b: &PlayerStats, sort_by: SortBy) -> Ordering {
    let primary = match sort_by {
        SortBy::Wins => b
            .wins
            .cmp(&a.wins)
            .then_with(|| b.win_rate.total_cmp(&a.win_rate)),
        SortBy::WinRate => qualifies_for_win_rate(b)
            .cmp(&qualifies_for_win_rate(a))
            .then_with(|| b.win_rate.total_cmp(&a.win_rate))
            .then_with(|| b.wins.cmp(&a.wins)),
        SortBy::GamesPlayed => b.games_played.cmp(&a.games_played),
    };
    primary.then_with(|| a.address.cmp(&b.address))
}

/// Rank players. The order is total, so the same input always yields the
/// same list.
pub fn get_leaderboard(stats: &StatsByAddress, sort_by: SortBy) -> Vec<PlayerStats> {
    let mut players: Vec<PlayerStats> = stats.values().cloned().collect();
    players.sort_by(|a, b| compare_players(a, b, sort_by));
    tracing::debug!(
        "Leaderboard by {:?}: top={}",
        sort_by,
        players
            .first()
            .map(|p| format_address(&p.address))
            .unwrap_or_else(|| "-".to_string())
    );
    players
}

pub fn player_stats<'a>(stats: &'a StatsByAddress, address: &str) -> Option<&'a PlayerStats> {
    stats.get(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fakes::FakeLedger;
    use crate::ledger::history::make_move_tx;
    use crate::services::cache_store::MemoryCacheStore;
    use crate::utils::ManualClock;
    use rand::seq::SliceRandom;
    use std::time::Duration;

    const NOW_MS: i64 = 1_700_000_000_000;

    fn player(address: &str, games: u32, wins: u32) -> PlayerStats {
        PlayerStats {
            address: address.to_string(),
            games_played: games,
            wins,
            losses: 0,
            draws: games - wins,
            win_rate: if games > 0 {
                wins as f64 / games as f64 * 100.0
            } else {
                0.0
            },
            last_played_at: 0,
        }
    }

    fn stats_of(players: Vec<PlayerStats>) -> StatsByAddress {
        players.into_iter().map(|p| (p.address.clone(), p)).collect()
    }

    fn addresses(board: &[PlayerStats]) -> Vec<&str> {
        board.iter().map(|p| p.address.as_str()).collect()
    }

    fn record(tx_id: &str, addr: &str, outcome: Outcome, timestamp: i64) -> GameRecord {
        GameRecord {
            tx_id: tx_id.to_string(),
            player_address: addr.to_string(),
            outcome,
            timestamp,
            sequence_height: 1,
        }
    }

    fn history(count: usize) -> Vec<Value> {
        (0..count)
            .map(|i| make_move_tx(&format!("0x{:04x}", i), &format!("ST{}", i % 3), 1_000 + i as i64, i as u64))
            .collect()
    }

    struct Harness {
        fake: Arc<FakeLedger>,
        store: Arc<MemoryCacheStore>,
        clock: Arc<ManualClock>,
        aggregator: StatsAggregator,
    }

    fn harness() -> Harness {
        let fake = Arc::new(FakeLedger::new());
        let store = Arc::new(MemoryCacheStore::new());
        let clock = Arc::new(ManualClock::new(NOW_MS));
        let aggregator = StatsAggregator::new(
            fake.clone(),
            store.clone(),
            clock.clone(),
            StatsSettings::default(),
        );
        Harness {
            fake,
            store,
            clock,
            aggregator,
        }
    }

    #[test]
    fn wins_ties_break_on_win_rate() {
        let stats = stats_of(vec![player("addr2", 10, 4), player("addr1", 5, 4)]);
        let board = get_leaderboard(&stats, SortBy::Wins);
        assert_eq!(addresses(&board), vec!["addr1", "addr2"]);
    }

    #[test]
    fn win_rate_requires_minimum_games() {
        let stats = stats_of(vec![
            player("addr3", 1, 1),
            player("addr1", 5, 4),
            player("addr2", 10, 4),
        ]);
        let board = get_leaderboard(&stats, SortBy::WinRate);
        assert_eq!(addresses(&board), vec!["addr1", "addr2", "addr3"]);
    }

    #[test]
    fn games_played_sort_is_descending() {
        let stats = stats_of(vec![
            player("addr1", 5, 4),
            player("addr2", 10, 4),
            player("addr3", 1, 1),
        ]);
        let board = get_leaderboard(&stats, SortBy::GamesPlayed);
        assert_eq!(addresses(&board), vec!["addr2", "addr1", "addr3"]);
    }

    #[test]
    fn identical_players_order_by_address() {
        let stats = stats_of(vec![player("STB", 3, 1), player("STA", 3, 1), player("STC", 3, 1)]);
        for sort_by in [SortBy::Wins, SortBy::WinRate, SortBy::GamesPlayed] {
            assert_eq!(addresses(&get_leaderboard(&stats, sort_by)), vec!["STA", "STB", "STC"]);
        }
    }

    #[test]
    fn sorting_twice_is_idempotent() {
        let stats = stats_of(vec![
            player("a", 7, 2),
            player("b", 2, 2),
            player("c", 7, 5),
            player("d", 4, 0),
        ]);
        for sort_by in [SortBy::Wins, SortBy::WinRate, SortBy::GamesPlayed] {
            let once = get_leaderboard(&stats, sort_by);
            let twice = get_leaderboard(&stats_of(once.clone()), sort_by);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn aggregation_ignores_record_order() {
        let mut games = vec![
            record("1", "ST1", Outcome::Win, 10),
            record("2", "ST1", Outcome::Loss, 30),
            record("3", "ST2", Outcome::Draw, 20),
            record("4", "ST1", Outcome::Draw, 5),
            record("5", "ST2", Outcome::Win, 40),
            record("6", "ST3", Outcome::Win, 1),
        ];
        let expected = aggregate_stats(&games);
        let mut rng = rand::rng();
        for _ in 0..20 {
            games.shuffle(&mut rng);
            assert_eq!(aggregate_stats(&games), expected);
        }

        let st1 = &expected["ST1"];
        assert_eq!((st1.games_played, st1.wins, st1.losses, st1.draws), (3, 1, 1, 1));
        assert_eq!(st1.last_played_at, 30);
        assert!((st1.win_rate - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn parsed_history_counts_draws_only() {
        let games = parse_records(&history(6));
        let stats = aggregate_stats(&games);
        assert_eq!(stats.len(), 3);
        for entry in stats.values() {
            assert_eq!(entry.games_played, 2);
            assert_eq!(entry.draws, 2);
            assert_eq!(entry.win_rate, 0.0);
        }
    }

    #[test]
    fn parse_records_skips_bad_and_duplicate_entries() {
        let mut raw = history(3);
        raw.push(make_move_tx("0x0000", "ST0", 1_000, 0));
        raw.push(serde_json::json!({
            "tx_type": "contract_call",
            "tx_status": "success",
            "contract_call": { "function_name": "make-move" }
        }));
        assert_eq!(parse_records(&raw).len(), 3);
    }

    #[test]
    fn player_lookup_is_exact() {
        let stats = stats_of(vec![player("ST1ABC", 1, 0)]);
        assert!(player_stats(&stats, "ST1ABC").is_some());
        assert!(player_stats(&stats, "st1abc").is_none());
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let h = harness();
        h.fake.set_history(history(5));

        let first = h.aggregator.fetch_player_stats(false).await;
        h.clock.advance(Duration::from_secs(299));
        let second = h.aggregator.fetch_player_stats(false).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(h.fake.lists(), 1);
        assert_eq!(first.games.len(), 5);
    }

    #[tokio::test]
    async fn expired_cache_refetches() {
        let h = harness();
        h.fake.set_history(history(5));

        h.aggregator.fetch_player_stats(false).await;
        h.clock.advance(Duration::from_secs(300));
        h.aggregator.fetch_player_stats(false).await;
        assert_eq!(h.fake.lists(), 2);
    }

    #[tokio::test]
    async fn force_refresh_and_clear_bypass_cache() {
        let h = harness();
        h.fake.set_history(history(5));

        h.aggregator.fetch_player_stats(false).await;
        h.aggregator.fetch_player_stats(true).await;
        assert_eq!(h.fake.lists(), 2);

        h.aggregator.clear_stats_cache().await.unwrap();
        assert!(h.store.get(STATS_CACHE_KEY).await.unwrap().is_none());
        h.aggregator.fetch_player_stats(false).await;
        assert_eq!(h.fake.lists(), 3);
    }

    #[tokio::test]
    async fn persisted_cache_survives_new_instance() {
        let h = harness();
        h.fake.set_history(history(4));
        h.aggregator.fetch_player_stats(false).await;

        let other_fake = Arc::new(FakeLedger::new());
        let reopened = StatsAggregator::new(
            other_fake.clone(),
            h.store.clone(),
            h.clock.clone(),
            StatsSettings::default(),
        );
        let snapshot = reopened.fetch_player_stats(false).await;
        assert_eq!(snapshot.games.len(), 4);
        assert_eq!(other_fake.lists(), 0);
    }

    #[tokio::test]
    async fn corrupt_or_foreign_cache_is_a_miss() {
        let h = harness();
        h.fake.set_history(history(2));

        h.store.set(STATS_CACHE_KEY, "{not json").await.unwrap();
        h.aggregator.fetch_player_stats(false).await;
        assert_eq!(h.fake.lists(), 1);

        let fresh = StatsAggregator::new(
            h.fake.clone(),
            h.store.clone(),
            h.clock.clone(),
            StatsSettings::default(),
        );
        let stale_version = serde_json::json!({
            "version": 0,
            "cached_at": NOW_MS,
            "stats": {},
            "games": []
        });
        h.store
            .set(STATS_CACHE_KEY, &stale_version.to_string())
            .await
            .unwrap();
        fresh.fetch_player_stats(false).await;
        assert_eq!(h.fake.lists(), 2);
    }

    #[tokio::test]
    async fn future_timestamp_is_a_miss() {
        let h = harness();
        h.fake.set_history(history(2));
        let envelope = serde_json::json!({
            "version": STATS_CACHE_VERSION,
            "cached_at": NOW_MS + 60_000,
            "stats": {},
            "games": []
        });
        h.store.set(STATS_CACHE_KEY, &envelope.to_string()).await.unwrap();

        let snapshot = h.aggregator.fetch_player_stats(false).await;
        assert_eq!(snapshot.games.len(), 2);
    }

    #[tokio::test]
    async fn paging_stops_at_transaction_cap() {
        let h = harness();
        h.fake.set_history(history(230));

        let snapshot = h.aggregator.fetch_player_stats(false).await;
        assert_eq!(h.fake.list_offsets(), vec![0, 50, 100, 150]);
        assert_eq!(snapshot.games.len(), 200);
    }

    #[tokio::test]
    async fn paging_stops_on_short_or_empty_page() {
        let h = harness();
        h.fake.set_history(history(120));
        h.aggregator.fetch_player_stats(false).await;
        assert_eq!(h.fake.list_offsets(), vec![0, 50, 100]);

        let h = harness();
        h.fake.set_history(history(100));
        h.aggregator.fetch_player_stats(false).await;
        assert_eq!(h.fake.list_offsets(), vec![0, 50, 100]);
    }

    #[tokio::test]
    async fn failed_page_keeps_prefix_but_skips_cache() {
        let h = harness();
        h.fake.set_history(history(120));
        h.fake.fail_list_at(50);

        let snapshot = h.aggregator.fetch_player_stats(false).await;
        assert_eq!(snapshot.games.len(), 50);
        assert!(h.store.get(STATS_CACHE_KEY).await.unwrap().is_none());

        h.aggregator.fetch_player_stats(false).await;
        assert_eq!(h.fake.list_offsets(), vec![0, 50, 0, 50]);
    }

    #[tokio::test]
    async fn leaderboard_uses_cached_snapshot() {
        let h = harness();
        h.fake.set_history(history(9));
        let board = h.aggregator.leaderboard(SortBy::GamesPlayed).await;
        assert_eq!(addresses(&board), vec!["ST0", "ST1", "ST2"]);
        h.aggregator.leaderboard(SortBy::Wins).await;
        assert_eq!(h.fake.lists(), 1);
    }
}
