use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::LifecycleSettings,
    constants::{
        MSG_CANCELLED, MSG_CELL_OCCUPIED, MSG_MOVE_CONFIRMED, MSG_MOVE_FAILED,
        MSG_RESET_CONFIRMED, MSG_RESET_FAILED, MSG_SIGN_MOVE, MSG_SIGN_RESET, MSG_SUBMITTED,
    },
    error::{AppError, Result},
    ledger::{LedgerGateway, SubmitOutcome},
    models::game::index_to_row_col,
    session::SessionContext,
};

use super::sync_engine::SyncEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Move,
    Reset,
}

impl TxKind {
    fn confirmed_message(self) -> &'static str {
        match self {
            TxKind::Move => MSG_MOVE_CONFIRMED,
            TxKind::Reset => MSG_RESET_CONFIRMED,
        }
    }

    fn failed_message(self) -> &'static str {
        match self {
            TxKind::Move => MSG_MOVE_FAILED,
            TxKind::Reset => MSG_RESET_FAILED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TxPhase {
    Idle,
    AwaitingSignature,
    Submitted,
    Confirming,
    Confirmed,
    Cancelled,
    Failed,
}

/// The single in-flight transaction. Dropped when it reaches a terminal phase.
#[derive(Debug, Clone, Serialize)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub cell: Option<usize>,
    pub requested_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub poll_attempts: u32,
    pub phase: TxPhase,
    pub tx_id: Option<String>,
}

impl PendingTransaction {
    fn new(kind: TxKind, cell: Option<usize>) -> Self {
        Self {
            kind,
            cell,
            requested_at: Utc::now(),
            submitted_at: None,
            poll_attempts: 0,
            phase: TxPhase::AwaitingSignature,
            tx_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum TxOutcome {
    /// Polling ended by attempt cap or deadline. Settlement is assumed, not
    /// observed.
    Confirmed { tx_id: String, poll_attempts: u32 },
    Cancelled,
    Failed { reason: String },
}

impl TxOutcome {
    pub fn phase(&self) -> TxPhase {
        match self {
            TxOutcome::Confirmed { .. } => TxPhase::Confirmed,
            TxOutcome::Cancelled => TxPhase::Cancelled,
            TxOutcome::Failed { .. } => TxPhase::Failed,
        }
    }
}

/// What the presentation layer shows about transaction progress.
#[derive(Debug, Clone, Serialize)]
pub struct TxView {
    pub phase: TxPhase,
    pub pending: Option<PendingTransaction>,
    pub last_outcome: Option<TxOutcome>,
    pub message: Option<String>,
}

struct StatusMessage {
    seq: u64,
    text: String,
}

#[derive(Default)]
struct LifecycleState {
    pending: Option<PendingTransaction>,
    last_outcome: Option<TxOutcome>,
    message: Option<StatusMessage>,
    message_seq: u64,
}

impl LifecycleState {
    fn set_message(&mut self, text: &str) -> u64 {
        self.message_seq += 1;
        self.message = Some(StatusMessage {
            seq: self.message_seq,
            text: text.to_string(),
        });
        self.message_seq
    }
}

/// Drives one move or reset at a time from signature to assumed settlement.
pub struct TxLifecycleController {
    gateway: Arc<dyn LedgerGateway>,
    sync: Arc<SyncEngine>,
    session: SessionContext,
    settings: LifecycleSettings,
    state: Mutex<LifecycleState>,
    cancel: CancellationToken,
}

impl TxLifecycleController {
    pub fn new(
        gateway: Arc<dyn LedgerGateway>,
        sync: Arc<SyncEngine>,
        session: SessionContext,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            gateway,
            sync,
            session,
            settings,
            state: Mutex::new(LifecycleState::default()),
            cancel: CancellationToken::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn view(&self) -> TxView {
        let state = self.lock();
        TxView {
            phase: state
                .pending
                .as_ref()
                .map(|p| p.phase)
                .unwrap_or(TxPhase::Idle),
            pending: state.pending.clone(),
            last_outcome: state.last_outcome.clone(),
            message: state.message.as_ref().map(|m| m.text.clone()),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Validate a move against the local snapshot, claim the slot and drive
    /// the transaction in the background.
    pub async fn start_move(self: &Arc<Self>, index: usize) -> Result<JoinHandle<TxOutcome>> {
        let (row, col) = index_to_row_col(index)?;
        let snapshot = self.sync.snapshot().await;

        let occupied_seq = {
            let mut state = self.lock();
            if state.pending.is_some() {
                return Err(AppError::Busy);
            }
            if !snapshot.status.is_active() {
                return Err(AppError::GameNotActive);
            }
            if snapshot.turn != self.session.side() {
                return Err(AppError::NotYourTurn);
            }
            let empty = snapshot.board.get(index).map(|c| c.is_empty()).unwrap_or(false);
            if empty {
                state.pending = Some(PendingTransaction::new(TxKind::Move, Some(index)));
                state.set_message(MSG_SIGN_MOVE);
                None
            } else {
                Some(state.set_message(MSG_CELL_OCCUPIED))
            }
        };
        if let Some(seq) = occupied_seq {
            self.schedule_clear(seq);
            return Err(AppError::CellOccupied);
        }

        tracing::info!("Move requested at cell {} (row={}, col={})", index, row, col);
        let controller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            controller.execute(TxKind::Move, Some((row, col))).await
        }))
    }

    pub async fn start_reset(self: &Arc<Self>) -> Result<JoinHandle<TxOutcome>> {
        {
            let mut state = self.lock();
            if state.pending.is_some() {
                return Err(AppError::Busy);
            }
            state.pending = Some(PendingTransaction::new(TxKind::Reset, None));
            state.set_message(MSG_SIGN_RESET);
        }

        tracing::info!("New game requested");
        let controller = Arc::clone(self);
        Ok(tokio::spawn(async move {
            controller.execute(TxKind::Reset, None).await
        }))
    }

    /// Run a move to its terminal outcome.
    pub async fn submit_move(self: &Arc<Self>, index: usize) -> Result<TxOutcome> {
        let handle = self.start_move(index).await?;
        handle
            .await
            .map_err(|e| AppError::Internal(format!("move task failed: {}", e)))
    }

    pub async fn submit_reset(self: &Arc<Self>) -> Result<TxOutcome> {
        let handle = self.start_reset().await?;
        handle
            .await
            .map_err(|e| AppError::Internal(format!("reset task failed: {}", e)))
    }

    async fn execute(self: Arc<Self>, kind: TxKind, target: Option<(u8, u8)>) -> TxOutcome {
        let submitted = match (kind, target) {
            (TxKind::Move, Some((row, col))) => self.gateway.submit_move(row, col).await,
            _ => self.gateway.submit_reset().await,
        };

        let tx_id = match submitted {
            Ok(SubmitOutcome::Accepted { tx_id }) => tx_id,
            Ok(SubmitOutcome::Cancelled) => {
                tracing::info!("{:?} transaction cancelled by user", kind);
                return self.finish(TxOutcome::Cancelled, MSG_CANCELLED);
            }
            Err(err) => {
                tracing::warn!("{:?} transaction failed: {}", kind, err);
                return self.finish(
                    TxOutcome::Failed {
                        reason: err.to_string(),
                    },
                    kind.failed_message(),
                );
            }
        };

        let submitted_at = Instant::now();
        let deadline = submitted_at + self.timeout_for(kind);
        tracing::info!("{:?} transaction submitted: {}", kind, tx_id);
        {
            let mut state = self.lock();
            if let Some(pending) = state.pending.as_mut() {
                pending.phase = TxPhase::Submitted;
                pending.submitted_at = Some(Utc::now());
                pending.tx_id = Some(tx_id.clone());
            }
            state.set_message(MSG_SUBMITTED);
        }

        let confirmed = if self.refresh_before(deadline).await {
            self.set_phase(TxPhase::Confirming);
            self.await_confirmation(kind, submitted_at, deadline).await
        } else {
            None
        };
        // Last look at the contract before declaring the terminal state.
        let refreshed = match confirmed {
            Some(_) => {
                self.refresh_before(Instant::now() + self.settings.poll_interval)
                    .await
            }
            None => false,
        };

        match confirmed {
            Some(poll_attempts) if refreshed => self.finish(
                TxOutcome::Confirmed {
                    tx_id,
                    poll_attempts,
                },
                kind.confirmed_message(),
            ),
            _ => self.finish(
                TxOutcome::Failed {
                    reason: "shut down before confirmation".to_string(),
                },
                kind.failed_message(),
            ),
        }
    }

    fn timeout_for(&self, kind: TxKind) -> Duration {
        match kind {
            TxKind::Move => self.settings.move_timeout,
            TxKind::Reset => self.settings.reset_timeout,
        }
    }

    /// Refresh the snapshot, abandoning the read at `until`. `false` on
    /// shutdown.
    async fn refresh_before(&self, until: Instant) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep_until(until) => {
                tracing::debug!("Game state refresh still pending at deadline, abandoned");
                true
            }
            _ = self.sync.refresh() => true,
        }
    }

    /// Poll until the attempt cap or the absolute deadline. `None` on shutdown.
    async fn await_confirmation(
        &self,
        kind: TxKind,
        submitted_at: Instant,
        deadline: Instant,
    ) -> Option<u32> {
        let poll = self.settings.poll_interval;
        let mut ticker = interval_at(submitted_at + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempts = 0u32;
        while attempts < self.settings.max_poll_attempts {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = sleep_until(deadline) => {
                    tracing::debug!("{:?} confirmation deadline reached after {} polls", kind, attempts);
                    break;
                }
                _ = ticker.tick() => {
                    attempts += 1;
                    {
                        let mut state = self.lock();
                        if let Some(pending) = state.pending.as_mut() {
                            pending.poll_attempts = attempts;
                        }
                    }
                    tracing::debug!("{:?} confirmation poll {}/{}", kind, attempts, self.settings.max_poll_attempts);
                    if !self.refresh_before(deadline).await {
                        return None;
                    }
                }
            }
        }
        Some(attempts)
    }

    fn set_phase(&self, phase: TxPhase) {
        let mut state = self.lock();
        if let Some(pending) = state.pending.as_mut() {
            pending.phase = phase;
        }
    }

    fn finish(self: &Arc<Self>, outcome: TxOutcome, message: &str) -> TxOutcome {
        let seq = {
            let mut state = self.lock();
            state.pending = None;
            state.last_outcome = Some(outcome.clone());
            state.set_message(message)
        };
        tracing::info!("Transaction finished: {:?}", outcome.phase());
        self.schedule_clear(seq);
        outcome
    }

    /// Clear message `seq` after the display delay unless it was replaced.
    fn schedule_clear(self: &Arc<Self>, seq: u64) {
        let controller = Arc::clone(self);
        let delay = self.settings.status_clear_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = controller.cancel.cancelled() => {}
                _ = sleep(delay) => {
                    let mut state = controller.lock();
                    if state.message.as_ref().map(|m| m.seq) == Some(seq) {
                        state.message = None;
                    }
                }
            }
        });
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}
