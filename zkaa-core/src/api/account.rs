use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;
use zkaa_common::{
    account::available_balance,
    api::{BalanceResponse, CreateAccountRequest, CreateAccountResponse, ExistsResponse, LedgerEvent},
    lamports_to_units, message, Address, EmailHash, Salt, UserAccount, ZkaaError,
};

use crate::{error::AppError, state::AppState};

/// Resolves the `/:email_hash/:salt` path segments to the derived address.
fn locate(state: &AppState, email_hash: &str, salt: String) -> Result<Address, AppError> {
    let email_hash: EmailHash = email_hash.parse()?;
    let salt = Salt::new(salt)?;
    let (address, _) = state.deriver.derive(&email_hash, &salt)?;
    Ok(address)
}

pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<CreateAccountResponse>, AppError> {
    let salt = Salt::new(req.salt)?;
    let digest = message::create_account_digest(
        &req.email_hash,
        &salt,
        &req.relayer.fee_payer,
        req.relayer.nonce,
    );
    req.relayer.verify(&digest)?;

    let receipt = state
        .authorizer()
        .authenticate(&req.proof)?
        .select_account(salt.clone())?
        .create_account(&req.email_hash, req.relayer.fee_payer, req.relayer.signature)
        .await?;

    state.publish(LedgerEvent::AccountCreated {
        event_id: Uuid::new_v4(),
        address: receipt.address,
        email_hash: req.email_hash,
        salt,
        bump: receipt.bump,
        signature: receipt.signature,
        timestamp: Utc::now(),
    });

    Ok(Json(CreateAccountResponse {
        signature: receipt.signature,
        address: receipt.address,
        bump: receipt.bump,
    }))
}

pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path((email_hash, salt)): Path<(String, String)>,
) -> Result<Json<BalanceResponse>, AppError> {
    let address = locate(&state, &email_hash, salt)?;
    let raw_lamports = state.registry.raw_balance(&address).await?;
    let rent_exempt_reserve = state.registry.rent_exempt_reserve();
    let available_lamports = available_balance(raw_lamports, rent_exempt_reserve);

    Ok(Json(BalanceResponse {
        address,
        raw_lamports,
        rent_exempt_reserve,
        available_lamports,
        balance: lamports_to_units(available_lamports),
    }))
}

pub async fn exists(
    State(state): State<Arc<AppState>>,
    Path((email_hash, salt)): Path<(String, String)>,
) -> Result<Json<ExistsResponse>, AppError> {
    let address = locate(&state, &email_hash, salt)?;
    let exists = state.registry.exists(&address).await?;
    Ok(Json(ExistsResponse { address, exists }))
}

pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Path((email_hash, salt)): Path<(String, String)>,
) -> Result<Json<UserAccount>, AppError> {
    let address = locate(&state, &email_hash, salt)?;
    let account = state
        .registry
        .account(&address)
        .await?
        .ok_or(ZkaaError::AccountNotInitialized(address))?;
    Ok(Json(account))
}
