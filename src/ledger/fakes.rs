//! In-memory gateway used by service tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{AppError, Result};

use super::{LedgerGateway, SubmitOutcome};

#[derive(Debug, Clone)]
pub enum FakeSubmit {
    Accept(String),
    Cancel,
    Reject(String),
}

struct FakeState {
    board: Vec<u128>,
    status: u128,
    turn: u128,
    fail_board: bool,
    fail_status: bool,
    fail_turn: bool,
    board_delays: VecDeque<Duration>,
    boards_after: VecDeque<Vec<u128>>,
    valid_move: bool,
    submit_script: VecDeque<FakeSubmit>,
    submit_delay: Option<Duration>,
    history: Vec<Value>,
    fail_list_at_offset: Option<usize>,
    list_offsets: Vec<usize>,
}

pub struct FakeLedger {
    state: Mutex<FakeState>,
    pub board_reads: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub submit_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                board: vec![0; 9],
                status: 0,
                turn: 1,
                fail_board: false,
                fail_status: false,
                fail_turn: false,
                board_delays: VecDeque::new(),
                boards_after: VecDeque::new(),
                valid_move: true,
                submit_script: VecDeque::new(),
                submit_delay: None,
                history: Vec::new(),
                fail_list_at_offset: None,
                list_offsets: Vec::new(),
            }),
            board_reads: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            submit_calls: AtomicUsize::new(0),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut guard = self.state.lock().unwrap();
        f(&mut guard)
    }

    pub fn set_state(&self, board: Vec<u128>, status: u128, turn: u128) {
        self.with(|s| {
            s.board = board;
            s.status = status;
            s.turn = turn;
        });
    }

    pub fn fail_reads(&self, board: bool, status: bool, turn: bool) {
        self.with(|s| {
            s.fail_board = board;
            s.fail_status = status;
            s.fail_turn = turn;
        });
    }

    /// Delay the next board reads, in order.
    pub fn push_board_delay(&self, delay: Duration) {
        self.with(|s| s.board_delays.push_back(delay));
    }

    /// Board returned by the next read; afterwards reads fall back to the
    /// base board.
    pub fn push_board(&self, board: Vec<u128>) {
        self.with(|s| s.boards_after.push_back(board));
    }

    pub fn set_valid_move(&self, valid: bool) {
        self.with(|s| s.valid_move = valid);
    }

    pub fn push_submit(&self, outcome: FakeSubmit) {
        self.with(|s| s.submit_script.push_back(outcome));
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        self.with(|s| s.submit_delay = Some(delay));
    }

    pub fn set_history(&self, history: Vec<Value>) {
        self.with(|s| s.history = history);
    }

    pub fn fail_list_at(&self, offset: usize) {
        self.with(|s| s.fail_list_at_offset = Some(offset));
    }

    pub fn list_offsets(&self) -> Vec<usize> {
        self.with(|s| s.list_offsets.clone())
    }

    pub fn reads(&self) -> usize {
        self.board_reads.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    async fn submit(&self) -> Result<SubmitOutcome> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, scripted) = self.with(|s| (s.submit_delay, s.submit_script.pop_front()));
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match scripted.unwrap_or_else(|| FakeSubmit::Accept(format!("0xfake{}", n))) {
            FakeSubmit::Accept(tx_id) => Ok(SubmitOutcome::Accepted { tx_id }),
            FakeSubmit::Cancel => Ok(SubmitOutcome::Cancelled),
            FakeSubmit::Reject(reason) => Err(AppError::SubmissionRejected(reason)),
        }
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    async fn get_board_state(&self) -> Result<Vec<u128>> {
        self.board_reads.fetch_add(1, Ordering::SeqCst);
        let (delay, fail, board) = self.with(|s| {
            let board = s.boards_after.pop_front().unwrap_or_else(|| s.board.clone());
            (s.board_delays.pop_front(), s.fail_board, board)
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(AppError::LedgerRpc("board unavailable".to_string()));
        }
        Ok(board)
    }

    async fn get_game_status(&self) -> Result<u128> {
        let (fail, status) = self.with(|s| (s.fail_status, s.status));
        if fail {
            return Err(AppError::LedgerRpc("status unavailable".to_string()));
        }
        Ok(status)
    }

    async fn get_current_turn(&self) -> Result<u128> {
        let (fail, turn) = self.with(|s| (s.fail_turn, s.turn));
        if fail {
            return Err(AppError::LedgerRpc("turn unavailable".to_string()));
        }
        Ok(turn)
    }

    async fn is_valid_move(&self, _row: u8, _col: u8) -> Result<bool> {
        Ok(self.with(|s| s.valid_move))
    }

    async fn submit_move(&self, _row: u8, _col: u8) -> Result<SubmitOutcome> {
        self.submit().await
    }

    async fn submit_reset(&self) -> Result<SubmitOutcome> {
        self.submit().await
    }

    async fn list_transactions(&self, limit: usize, offset: usize) -> Result<Vec<Value>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.with(|s| {
            s.list_offsets.push(offset);
            if s.fail_list_at_offset == Some(offset) {
                return Err(AppError::LedgerRpc("history unavailable".to_string()));
            }
            let start = offset.min(s.history.len());
            let end = offset.saturating_add(limit).min(s.history.len());
            Ok(s.history[start..end].to_vec())
        })
    }
}
