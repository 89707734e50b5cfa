pub mod clarity;
pub mod client;
pub mod history;
pub mod signer;

#[cfg(test)]
pub(crate) mod fakes;

use async_trait::async_trait;
use std::time::Duration;

use crate::{
    constants::HTTP_CONNECT_TIMEOUT_SECS,
    error::{AppError, Result},
};

pub use client::StacksClient;

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

/// Resolution of a signature request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted { tx_id: String },
    Cancelled,
}

/// Stateless view of the remote game contract.
///
/// Read queries are independently fallible; callers decide what a failure
/// means for their local state.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    async fn get_board_state(&self) -> Result<Vec<u128>>;

    async fn get_game_status(&self) -> Result<u128>;

    async fn get_current_turn(&self) -> Result<u128>;

    async fn is_valid_move(&self, row: u8, col: u8) -> Result<bool>;

    async fn submit_move(&self, row: u8, col: u8) -> Result<SubmitOutcome>;

    async fn submit_reset(&self) -> Result<SubmitOutcome>;

    /// One page of contract transactions, most recent first (not guaranteed).
    async fn list_transactions(&self, limit: usize, offset: usize)
        -> Result<Vec<serde_json::Value>>;
}
