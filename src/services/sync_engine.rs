use chrono::{DateTime, Utc};
use futures_util::future::join3;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::SyncSettings,
    error::{AppError, Result},
    ledger::LedgerGateway,
    models::{Board, GameSnapshot, GameStatus, Side, WinningLine},
};

/// Rows, then columns, then the two diagonals. Scan order decides which line
/// is reported when several are complete.
const LINES: [WinningLine; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// First line of three equal, non-empty cells.
pub fn detect_winning_line(board: &Board) -> Option<WinningLine> {
    let cells = board.cells();
    LINES.iter().copied().find(|[a, b, c]| {
        !cells[*a].is_empty() && cells[*a] == cells[*b] && cells[*a] == cells[*c]
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A query failed or returned something unusable; previous snapshot kept.
    Retained,
    /// A later refresh was applied first; result discarded.
    Superseded,
}

struct SyncState {
    snapshot: GameSnapshot,
    applied_seq: u64,
    last_synced_at: Option<DateTime<Utc>>,
}

/// Owns the observed board, status and turn and keeps them reconciled with
/// the contract.
pub struct SyncEngine {
    gateway: Arc<dyn LedgerGateway>,
    state: RwLock<SyncState>,
    next_seq: AtomicU64,
    settings: SyncSettings,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn LedgerGateway>, settings: SyncSettings) -> Self {
        Self {
            gateway,
            state: RwLock::new(SyncState {
                snapshot: GameSnapshot::default(),
                applied_seq: 0,
                last_synced_at: None,
            }),
            next_seq: AtomicU64::new(0),
            settings,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    pub async fn snapshot(&self) -> GameSnapshot {
        self.state.read().await.snapshot.clone()
    }

    pub async fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.last_synced_at
    }

    /// Query board, status and turn together and apply them as one snapshot.
    pub async fn refresh(&self) -> RefreshOutcome {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let (board, status, turn) = join3(
            self.gateway.get_board_state(),
            self.gateway.get_game_status(),
            self.gateway.get_current_turn(),
        )
        .await;

        let snapshot = match build_snapshot(board, status, turn) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!("Game state refresh #{} failed, keeping previous state: {}", seq, err);
                return RefreshOutcome::Retained;
            }
        };

        let mut state = self.state.write().await;
        if seq < state.applied_seq {
            tracing::debug!(
                "Discarding refresh #{} (refresh #{} already applied)",
                seq,
                state.applied_seq
            );
            return RefreshOutcome::Superseded;
        }
        state.snapshot = snapshot;
        state.applied_seq = seq;
        state.last_synced_at = Some(Utc::now());
        RefreshOutcome::Applied
    }

    /// Start the steady-state refresh loop. The first refresh runs immediately.
    /// An engine that has been shut down stays stopped.
    pub fn start(self: &Arc<Self>) {
        let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return;
        }
        if self.cancel.is_cancelled() {
            tracing::warn!("Sync engine already shut down, not restarting");
            return;
        }

        let engine = Arc::clone(self);
        let cancel = self.cancel.clone();
        let every = self.settings.interval;
        *guard = Some(tokio::spawn(async move {
            tracing::info!("Sync engine started (interval={}s)", every.as_secs_f64());
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // An in-flight read is dropped on shutdown.
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = engine.refresh() => {}
                        }
                    }
                }
            }
            tracing::info!("Sync engine stopped");
        }));
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

// Internal helper that parses or transforms values for `build_snapshot`.
fn build_snapshot(
    board: Result<Vec<u128>>,
    status: Result<u128>,
    turn: Result<u128>,
) -> Result<GameSnapshot> {
    let board = Board::from_codes(&board?)?;
    let status_code = status?;
    let status = GameStatus::from_code(status_code)
        .ok_or_else(|| AppError::Decode(format!("unknown game status {}", status_code)))?;
    let turn_code = turn?;
    let turn = Side::from_code(turn_code)
        .ok_or_else(|| AppError::Decode(format!("unknown turn {}", turn_code)))?;

    let winning_line = if status.is_won() {
        detect_winning_line(&board)
    } else {
        None
    };

    Ok(GameSnapshot {
        board,
        status,
        turn,
        winning_line,
    })
}
