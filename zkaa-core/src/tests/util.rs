use axum::{
    extract::{Path, State},
    Json,
};
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use zkaa_common::{
    api::{CreateAccountRequest, FaucetRequest, TransferRequest},
    message, Address, EmailHash, Proof, PublicOutputs, RelayerAuth, Salt, TxSignature,
    LAMPORTS_PER_UNIT,
};

use super::TEST_VKEY_HASH;
use crate::{
    api::{account, faucet},
    state::AppState,
    verifier::CommitmentVerifier,
};

pub fn email_hash(email: &str) -> EmailHash {
    EmailHash(Sha256::digest(email.as_bytes()).into())
}

pub fn proof_for(email_hash: EmailHash, verified: bool) -> Proof {
    let outputs = PublicOutputs {
        email_hash,
        subject: "104329871203948712".into(),
        issuer: "https://accounts.google.com".into(),
        audience: "zkaa-demo".into(),
        verified,
    };
    CommitmentVerifier::new(TEST_VKEY_HASH).seal(outputs.encode())
}

pub fn verified_proof(email_hash: EmailHash) -> Proof {
    proof_for(email_hash, true)
}

pub fn relayer_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

pub fn address_of(key: &SigningKey) -> Address {
    Address(key.verifying_key().to_bytes())
}

fn authorize(key: &SigningKey, digest: &[u8; 32], nonce: u64) -> RelayerAuth {
    RelayerAuth {
        fee_payer: address_of(key),
        nonce,
        signature: TxSignature(key.sign(digest).to_bytes()),
    }
}

/// Gives the relayer enough lamports to pay several rent reserves.
pub async fn fund_relayer(state: &Arc<AppState>, key: &SigningKey) {
    fund(state, address_of(key), 10 * LAMPORTS_PER_UNIT).await;
}

pub async fn fund(state: &Arc<AppState>, address: Address, amount: u64) -> u64 {
    let response = faucet::fund(State(state.clone()), Json(FaucetRequest { address, amount }))
        .await
        .expect("faucet deposit failed");
    response.0.raw_lamports
}

pub fn create_request(
    key: &SigningKey,
    email_hash: EmailHash,
    salt: &str,
    proof: Proof,
    nonce: u64,
) -> CreateAccountRequest {
    // Signing needs a valid salt; over-long salts are signed as empty so the
    // request still reaches the handler.
    let signed_salt = Salt::new(salt).unwrap_or_else(|_| Salt::new("").unwrap());
    let digest =
        message::create_account_digest(&email_hash, &signed_salt, &address_of(key), nonce);
    CreateAccountRequest {
        email_hash,
        salt: salt.to_string(),
        proof,
        relayer: authorize(key, &digest, nonce),
    }
}

pub fn transfer_request(
    key: &SigningKey,
    email_hash: EmailHash,
    salt: &str,
    proof: Proof,
    amount: u64,
    destination: Address,
    nonce: u64,
) -> TransferRequest {
    let digest = message::transfer_digest(
        &email_hash,
        &Salt::new(salt).unwrap(),
        amount,
        &destination,
        &address_of(key),
        nonce,
    );
    TransferRequest {
        email_hash,
        salt: salt.to_string(),
        proof,
        amount,
        destination: destination.to_string(),
        relayer: authorize(key, &digest, nonce),
    }
}

/// Creates the account for `(email, salt)` through the handler and returns
/// its address.
pub async fn open_account(
    state: &Arc<AppState>,
    relayer: &SigningKey,
    email: &str,
    salt: &str,
    nonce: u64,
) -> Address {
    let hash = email_hash(email);
    let req = create_request(relayer, hash, salt, verified_proof(hash), nonce);
    account::create_account(State(state.clone()), Json(req))
        .await
        .expect("account creation failed")
        .0
        .address
}

pub async fn available(state: &Arc<AppState>, email: &str, salt: &str) -> u64 {
    let path = Path((email_hash(email).to_string(), salt.to_string()));
    account::get_balance(State(state.clone()), path)
        .await
        .expect("balance query failed")
        .0
        .available_lamports
}
