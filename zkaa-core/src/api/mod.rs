use std::sync::Arc;

use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub mod account;
pub mod faucet;
pub mod transaction;
pub mod websocket;

pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/accounts", post(account::create_account))
        .route("/accounts/:email_hash/:salt", get(account::get_account))
        .route("/accounts/:email_hash/:salt/balance", get(account::get_balance))
        .route("/accounts/:email_hash/:salt/exists", get(account::exists))
        .route("/transfers", post(transaction::transfer))
        .route("/ws", get(websocket::handle_socket));

    if state.faucet_enabled {
        app = app.route("/faucet", post(faucet::fund));
    }

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "zkaa-ledger",
    }))
}
