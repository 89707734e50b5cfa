use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod ledger;
mod models;
mod services;
mod session;
mod utils;

use config::Config;
use constants::API_VERSION;
use ledger::{signer::TransactionSigner, signer::WalletBridgeSigner, LedgerGateway, StacksClient};
use session::SessionContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clarityxo_client=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting ClarityXO client");
    tracing::info!("Environment: {} ({})", config.environment, config.network_name());
    tracing::info!("API Version: {}", API_VERSION);
    tracing::info!(
        "Contract: {}.{}",
        utils::format_address(&config.contract_address),
        config.contract_name
    );

    let signer = WalletBridgeSigner::from_config(&config)?
        .map(|signer| Arc::new(signer) as Arc<dyn TransactionSigner>);
    let gateway: Arc<dyn LedgerGateway> = Arc::new(StacksClient::from_config(&config, signer)?);
    let store = services::cache_store_from_config(&config).await?;
    let session = SessionContext::from_config(&config);

    // Start background services
    let services =
        services::start_background_services(gateway.clone(), store, session.clone(), &config);

    let app_state = api::AppState::new(&services, gateway, session, config.clone());
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    services.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        // Without a signal handler the server keeps running until killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Game
        .route("/api/v1/game/state", get(api::game::get_game_state))
        .route("/api/v1/game/move", post(api::game::make_move))
        .route("/api/v1/game/reset", post(api::game::reset_game))
        .route("/api/v1/game/valid-move", get(api::game::check_valid_move))
        // Leaderboard & stats
        .route(
            "/api/v1/leaderboard/{sort}",
            get(api::leaderboard::get_leaderboard),
        )
        .route("/api/v1/stats/me", get(api::stats::get_my_stats))
        .route("/api/v1/stats/refresh", post(api::stats::refresh_stats))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}
