use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use zkaa_common::{
    api::{FaucetRequest, FaucetResponse, LedgerEvent},
    ZkaaError,
};

use crate::{error::AppError, state::AppState};

/// External deposit. Only routed when the faucet is enabled.
pub async fn fund(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FaucetRequest>,
) -> Result<Json<FaucetResponse>, AppError> {
    if req.amount == 0 {
        return Err(ZkaaError::InvalidInput("faucet amount must be positive".into()).into());
    }

    let raw_lamports = state.registry.fund(&req.address, req.amount).await?;
    tracing::info!(address = %req.address, amount = req.amount, "faucet deposit");

    state.publish(LedgerEvent::Funded {
        event_id: Uuid::new_v4(),
        address: req.address,
        amount: req.amount,
        timestamp: Utc::now(),
    });

    Ok(Json(FaucetResponse {
        address: req.address,
        raw_lamports,
    }))
}
