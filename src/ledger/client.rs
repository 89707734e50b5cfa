use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    constants::{
        FN_GET_BOARD_STATE, FN_GET_CURRENT_TURN, FN_GET_GAME_STATUS, FN_IS_VALID_MOVE,
        FN_MAKE_MOVE, FN_START_NEW_GAME, LEDGER_REQUEST_TIMEOUT_SECS,
    },
    error::{AppError, Result},
};

use super::{
    clarity::{self, ClarityValue},
    http_client,
    signer::{ContractCall, TransactionSigner},
    LedgerGateway, SubmitOutcome,
};

fn read_only_request(sender: &str, arguments: Vec<String>) -> serde_json::Value {
    serde_json::json!({
        "sender": sender,
        "arguments": arguments
    })
}

fn read_only_path(contract_address: &str, contract_name: &str, function: &str) -> String {
    format!(
        "/v2/contracts/call-read/{}/{}/{}",
        contract_address, contract_name, function
    )
}

fn transactions_path(contract_address: &str, contract_name: &str) -> String {
    format!(
        "/extended/v1/address/{}.{}/transactions",
        contract_address, contract_name
    )
}

/// Stacks node API client bound to one deployed contract.
pub struct StacksClient {
    api_url: String,
    contract_address: String,
    contract_name: String,
    network: String,
    client: reqwest::Client,
    signer: Option<Arc<dyn TransactionSigner>>,
}

impl StacksClient {
    pub fn new(
        api_url: String,
        contract_address: String,
        contract_name: String,
        network: String,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Self> {
        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            contract_address,
            contract_name,
            network,
            client: http_client(Duration::from_secs(LEDGER_REQUEST_TIMEOUT_SECS))?,
            signer,
        })
    }

    pub fn from_config(
        config: &Config,
        signer: Option<Arc<dyn TransactionSigner>>,
    ) -> Result<Self> {
        Self::new(
            config.stacks_api_url.clone(),
            config.contract_address.clone(),
            config.contract_name.clone(),
            config.network_name().to_string(),
            signer,
        )
    }

    fn url(&self, path: &str) -> Result<url::Url> {
        url::Url::parse(&format!("{}{}", self.api_url, path))
            .map_err(|e| AppError::Internal(format!("Invalid ledger URL: {}", e)))
    }

    /// Call a read-only function and unwrap its `(ok ..)` result.
    async fn call_read_only(&self, function: &str, arguments: Vec<String>) -> Result<ClarityValue> {
        let url = self.url(&read_only_path(
            &self.contract_address,
            &self.contract_name,
            function,
        ))?;
        let request = read_only_request(&self.contract_address, arguments);

        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::LedgerRpc(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::LedgerRpc(format!(
                "{} returned HTTP {}",
                function, status
            )));
        }

        let result: ReadOnlyResponse = response
            .json()
            .await
            .map_err(|e| AppError::LedgerRpc(e.to_string()))?;

        result.into_value(function)?.into_ok()
    }

    fn contract_call(&self, function: &str, function_args: Vec<String>) -> ContractCall {
        ContractCall {
            contract_address: self.contract_address.clone(),
            contract_name: self.contract_name.clone(),
            function_name: function.to_string(),
            function_args,
            network: self.network.clone(),
        }
    }

    async fn submit(&self, call: ContractCall) -> Result<SubmitOutcome> {
        let Some(signer) = self.signer.as_ref() else {
            return Err(AppError::SubmissionRejected(
                "No transaction signer configured. Set SIGNER_URL.".to_string(),
            ));
        };
        signer.sign_and_submit(&call).await
    }
}

#[async_trait]
impl LedgerGateway for StacksClient {
    async fn get_board_state(&self) -> Result<Vec<u128>> {
        self.call_read_only(FN_GET_BOARD_STATE, vec![])
            .await?
            .as_uint_list()
    }

    async fn get_game_status(&self) -> Result<u128> {
        self.call_read_only(FN_GET_GAME_STATUS, vec![]).await?.as_uint()
    }

    async fn get_current_turn(&self) -> Result<u128> {
        self.call_read_only(FN_GET_CURRENT_TURN, vec![])
            .await?
            .as_uint()
    }

    async fn is_valid_move(&self, row: u8, col: u8) -> Result<bool> {
        let args = vec![
            clarity::encode_uint(row as u128),
            clarity::encode_uint(col as u128),
        ];
        self.call_read_only(FN_IS_VALID_MOVE, args).await?.as_bool()
    }

    async fn submit_move(&self, row: u8, col: u8) -> Result<SubmitOutcome> {
        let call = self.contract_call(
            FN_MAKE_MOVE,
            vec![
                clarity::encode_uint(row as u128),
                clarity::encode_uint(col as u128),
            ],
        );
        self.submit(call).await
    }

    async fn submit_reset(&self) -> Result<SubmitOutcome> {
        let call = self.contract_call(FN_START_NEW_GAME, vec![]);
        self.submit(call).await
    }

    async fn list_transactions(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<serde_json::Value>> {
        let mut url = self.url(&transactions_path(&self.contract_address, &self.contract_name))?;
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::LedgerRpc(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::LedgerRpc(format!(
                "Failed to fetch transactions: {}",
                status
            )));
        }

        let page: TransactionPage = response
            .json()
            .await
            .map_err(|e| AppError::LedgerRpc(e.to_string()))?;

        Ok(page.results)
    }
}

#[derive(Debug, Deserialize)]
struct ReadOnlyResponse {
    okay: bool,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    cause: Option<String>,
}

impl ReadOnlyResponse {
    fn into_value(self, function: &str) -> Result<ClarityValue> {
        if !self.okay {
            return Err(AppError::LedgerRpc(format!(
                "{} failed: {}",
                function,
                self.cause.unwrap_or_else(|| "unknown cause".to_string())
            )));
        }
        let raw = self
            .result
            .ok_or_else(|| AppError::LedgerRpc(format!("{} returned no result", function)))?;
        clarity::decode_hex(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct TransactionPage {
    #[serde(default)]
    results: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_only_request_sets_sender_and_arguments() {
        let req = read_only_request("ST1", vec!["0x01".to_string()]);
        assert_eq!(req.get("sender").and_then(|v| v.as_str()), Some("ST1"));
        assert_eq!(
            req.get("arguments").and_then(|v| v.as_array()).map(|a| a.len()),
            Some(1)
        );
    }

    #[test]
    fn read_only_path_names_contract_and_function() {
        assert_eq!(
            read_only_path("ST1", "tictactoe", "get-board-state"),
            "/v2/contracts/call-read/ST1/tictactoe/get-board-state"
        );
    }

    #[test]
    fn transactions_url_carries_paging() {
        let client = StacksClient::new(
            "http://localhost:3999/".to_string(),
            "ST1".to_string(),
            "tictactoe".to_string(),
            "testnet".to_string(),
            None,
        )
        .unwrap();
        let mut url = client
            .url(&transactions_path("ST1", "tictactoe"))
            .unwrap();
        url.query_pairs_mut()
            .append_pair("limit", "50")
            .append_pair("offset", "100");
        assert_eq!(
            url.as_str(),
            "http://localhost:3999/extended/v1/address/ST1.tictactoe/transactions?limit=50&offset=100"
        );
    }

    #[test]
    fn read_only_response_not_okay_is_error() {
        let body: ReadOnlyResponse =
            serde_json::from_str(r#"{"okay":false,"cause":"NoSuchContract"}"#).unwrap();
        let err = body.into_value("get-game-status").unwrap_err();
        assert!(err.to_string().contains("NoSuchContract"));
    }

    #[test]
    fn read_only_response_decodes_result() {
        let body: ReadOnlyResponse = serde_json::from_str(
            r#"{"okay":true,"result":"0x070100000000000000000000000000000001"}"#,
        )
        .unwrap();
        let value = body.into_value("get-game-status").unwrap().into_ok().unwrap();
        assert_eq!(value.as_uint().unwrap(), 1);
    }

    #[tokio::test]
    async fn submit_without_signer_is_rejected() {
        let client = StacksClient::new(
            "http://localhost:3999".to_string(),
            "ST1".to_string(),
            "tictactoe".to_string(),
            "testnet".to_string(),
            None,
        )
        .unwrap();
        let result = client.submit_reset().await;
        assert!(matches!(result, Err(AppError::SubmissionRejected(_))));
    }

    #[test]
    fn contract_call_encodes_move_arguments() {
        let client = StacksClient::new(
            "http://localhost:3999".to_string(),
            "ST1".to_string(),
            "tictactoe".to_string(),
            "testnet".to_string(),
            None,
        )
        .unwrap();
        let call = client.contract_call(FN_MAKE_MOVE, vec![clarity::encode_uint(1)]);
        assert_eq!(call.function_name, "make-move");
        assert_eq!(call.contract_name, "tictactoe");
        assert_eq!(call.network, "testnet");
        assert!(call.function_args[0].starts_with("0x01"));
    }
}
