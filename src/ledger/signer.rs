use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    config::Config,
    constants::SIGNER_REQUEST_TIMEOUT_SECS,
    error::{AppError, Result},
};

use super::{http_client, SubmitOutcome};

/// A public contract call awaiting user approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractCall {
    pub contract_address: String,
    pub contract_name: String,
    pub function_name: String,
    /// Hex-encoded Clarity arguments.
    pub function_args: Vec<String>,
    pub network: String,
}

/// External wallet that asks the user to approve and broadcast a call.
#[async_trait]
pub trait TransactionSigner: Send + Sync {
    async fn sign_and_submit(&self, call: &ContractCall) -> Result<SubmitOutcome>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum BridgeResponse {
    Accepted {
        tx_id: String,
    },
    Cancelled,
    Rejected {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// Hands calls to a local wallet bridge over HTTP and waits for the user's
/// decision.
pub struct WalletBridgeSigner {
    url: String,
    client: reqwest::Client,
}

impl WalletBridgeSigner {
    pub fn new(url: String) -> Result<Self> {
        Ok(Self {
            url,
            client: http_client(Duration::from_secs(SIGNER_REQUEST_TIMEOUT_SECS))?,
        })
    }

    /// `None` when no bridge is configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>> {
        config.signer_url.clone().map(Self::new).transpose()
    }
}

#[async_trait]
impl TransactionSigner for WalletBridgeSigner {
    async fn sign_and_submit(&self, call: &ContractCall) -> Result<SubmitOutcome> {
        tracing::debug!("Requesting signature for {}", call.function_name);

        let response = self
            .client
            .post(&self.url)
            .json(call)
            .send()
            .await
            .map_err(|e| AppError::SubmissionRejected(format!("signer unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::SubmissionRejected(format!(
                "signer bridge returned {}",
                status
            )));
        }

        let body: BridgeResponse = response
            .json()
            .await
            .map_err(|e| AppError::SubmissionRejected(format!("invalid signer response: {}", e)))?;

        outcome_from_bridge(body)
    }
}

// Internal helper that parses or transforms values for `outcome_from_bridge`.
fn outcome_from_bridge(body: BridgeResponse) -> Result<SubmitOutcome> {
    match body {
        BridgeResponse::Accepted { tx_id } => Ok(SubmitOutcome::Accepted { tx_id }),
        BridgeResponse::Cancelled => Ok(SubmitOutcome::Cancelled),
        BridgeResponse::Rejected { reason } => Err(AppError::SubmissionRejected(
            reason.unwrap_or_else(|| "rejected by signer".to_string()),
        )),
    }
}
