use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub network: String,
    pub contract: String,
    pub sync_loop: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub signer: String,
    pub tx_in_flight: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let sync_loop = if state.sync.is_running() {
        "running".to_string()
    } else {
        "stopped".to_string()
    };

    let signer = if state.config.signer_url.is_some() {
        "configured".to_string()
    } else {
        "read-only".to_string()
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        network: state.config.network_name().to_string(),
        contract: format!(
            "{}.{}",
            state.config.contract_address, state.config.contract_name
        ),
        sync_loop,
        last_synced_at: state.sync.last_synced_at().await,
        signer,
        tx_in_flight: state.lifecycle.is_busy(),
    })
}
