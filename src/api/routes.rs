//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Chain endpoints
        .route("/api/chain", get(handlers::get_chain_info))
        .route(
            "/api/chain/blocks/{height}",
            get(handlers::get_block_by_height),
        )
        .route("/api/chain/validate", get(handlers::validate_chain))
        // Mining
        .route("/api/mine", post(handlers::mine_block))
        // Transactions
        .route("/api/transactions", post(handlers::submit_transaction))
        .route("/api/transactions/{hash}", get(handlers::get_transaction))
        .route("/api/mempool", get(handlers::get_pending))
        // Node wallet
        .route("/api/funds", get(handlers::get_funds))
        .with_state(state)
        .layer(cors)
}
