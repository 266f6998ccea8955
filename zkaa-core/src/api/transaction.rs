use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use zkaa_common::{
    api::{LedgerEvent, TransferRequest, TransferResponse},
    message, Address, Salt,
};

use crate::{error::AppError, state::AppState};

pub async fn transfer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, AppError> {
    // Local validation first; nothing below runs for a malformed request
    let salt = Salt::new(req.salt)?;
    let destination: Address = req.destination.parse()?;

    let digest = message::transfer_digest(
        &req.email_hash,
        &salt,
        req.amount,
        &destination,
        &req.relayer.fee_payer,
        req.relayer.nonce,
    );
    req.relayer.verify(&digest)?;

    let receipt = state
        .authorizer()
        .authenticate(&req.proof)?
        .select_account(salt)?
        .transfer(&req.email_hash, req.amount, destination, req.relayer.signature)
        .await?;

    state.publish(LedgerEvent::Transferred {
        event_id: Uuid::new_v4(),
        source: receipt.source,
        destination: receipt.destination,
        amount: receipt.amount,
        signature: receipt.signature,
        timestamp: Utc::now(),
    });

    Ok(Json(TransferResponse {
        signature: receipt.signature,
        source: receipt.source,
        destination: receipt.destination,
        amount: receipt.amount,
    }))
}
