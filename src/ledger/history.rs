use serde::Deserialize;
use serde_json::Value;

use crate::{
    constants::FN_MAKE_MOVE,
    error::{AppError, Result},
    models::{GameRecord, Outcome},
};

const TX_TYPE_CONTRACT_CALL: &str = "contract_call";
const TX_STATUS_SUCCESS: &str = "success";

/// Subset of a history feed entry needed to attribute a move.
#[derive(Debug, Deserialize)]
struct RawTransaction {
    tx_id: String,
    tx_type: String,
    tx_status: String,
    sender_address: String,
    #[serde(default)]
    contract_call: Option<RawContractCall>,
    #[serde(default)]
    tx_result: Option<RawTxResult>,
    #[serde(default)]
    burn_block_time: Option<i64>,
    #[serde(default)]
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawContractCall {
    function_name: String,
}

#[derive(Debug, Deserialize)]
struct RawTxResult {
    #[serde(default)]
    repr: Option<String>,
}

/// Parse one history entry.
///
/// `Ok(None)` means the entry is not a settled move and is ignored;
/// `Err` means the entry is malformed.
pub fn parse_game_record(raw: &Value) -> Result<Option<GameRecord>> {
    // Cheap filter first so unrelated entries never need the full shape.
    let tx_type = raw.get("tx_type").and_then(Value::as_str);
    let tx_status = raw.get("tx_status").and_then(Value::as_str);
    if tx_type != Some(TX_TYPE_CONTRACT_CALL) || tx_status != Some(TX_STATUS_SUCCESS) {
        return Ok(None);
    }

    let tx: RawTransaction = serde_json::from_value(raw.clone())
        .map_err(|e| AppError::Decode(format!("malformed transaction: {}", e)))?;

    let is_move = tx
        .contract_call
        .as_ref()
        .map(|call| call.function_name == FN_MAKE_MOVE)
        .unwrap_or(false);
    if !is_move {
        return Ok(None);
    }

    if tx.sender_address.trim().is_empty() {
        return Err(AppError::Decode(format!(
            "transaction {} has no sender",
            tx.tx_id
        )));
    }

    let outcome = classify_outcome(tx.tx_result.as_ref().and_then(|r| r.repr.as_deref()));

    Ok(Some(GameRecord {
        tx_id: tx.tx_id,
        player_address: tx.sender_address,
        outcome,
        timestamp: tx.burn_block_time.unwrap_or(0),
        sequence_height: tx.block_height.unwrap_or(0),
    }))
}

/// Outcome attributed to a settled move.
///
/// The history entry only carries the call result, not the game status that
/// followed it, so every move counts as a draw.
// TODO: read `get-game-status` at the transaction's block height and map
// XWon/OWon to Win/Loss for the sender.
pub fn classify_outcome(_result_repr: Option<&str>) -> Outcome {
    Outcome::Draw
}

#[cfg(test)]
pub(crate) fn make_move_tx(tx_id: &str, sender: &str, time: i64, height: u64) -> Value {
    serde_json::json!({
        "tx_id": tx_id,
        "tx_type": "contract_call",
        "tx_status": "success",
        "sender_address": sender,
        "contract_call": { "function_name": "make-move" },
        "tx_result": { "repr": "(ok true)" },
        "burn_block_time": time,
        "block_height": height
    })
}
