//! Request and response bodies of the ledger HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Address, EmailHash, ErrorKind, Proof, RelayerAuth, Salt, TxSignature};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccountRequest {
    pub email_hash: EmailHash,
    pub salt: String,
    pub proof: Proof,
    pub relayer: RelayerAuth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateAccountResponse {
    pub signature: TxSignature,
    pub address: Address,
    pub bump: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub email_hash: EmailHash,
    pub salt: String,
    pub proof: Proof,
    pub amount: u64,
    pub destination: String, // hex encoded address
    pub relayer: RelayerAuth,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub signature: TxSignature,
    pub source: Address,
    pub destination: Address,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub address: Address,
    pub raw_lamports: u64,
    pub rent_exempt_reserve: u64,
    pub available_lamports: u64,
    /// Available balance in display units.
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub address: Address,
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub address: Address,
    pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaucetResponse {
    pub address: Address,
    pub raw_lamports: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: ErrorKind,
}

/// Pushed to websocket subscribers after each committed mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    AccountCreated {
        event_id: Uuid,
        address: Address,
        email_hash: EmailHash,
        salt: Salt,
        bump: u8,
        signature: TxSignature,
        timestamp: DateTime<Utc>,
    },
    Transferred {
        event_id: Uuid,
        source: Address,
        destination: Address,
        amount: u64,
        signature: TxSignature,
        timestamp: DateTime<Utc>,
    },
    Funded {
        event_id: Uuid,
        address: Address,
        amount: u64,
        timestamp: DateTime<Utc>,
    },
}
