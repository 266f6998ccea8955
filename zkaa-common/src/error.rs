use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Address;

/// Everything that can reject an account operation, on either side of the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZkaaError {
    #[error("salt is {0} bytes long; at most 32 bytes are allowed")]
    SaltTooLong(usize),
    #[error("email hash does not match the proof claims")]
    EmailHashMismatch,
    #[error("account {0} is already initialized")]
    AccountAlreadyInitialized(Address),
    #[error("account {0} is not initialized")]
    AccountNotInitialized(Address),
    #[error("account record does not belong to the selected email hash and salt")]
    SaltMismatch,
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },
    #[error("malformed proof outputs: {0}")]
    MalformedProofOutputs(String),
    #[error("proof not verified")]
    ProofNotVerified,
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid fee payer signature")]
    InvalidSignature,
    #[error("transaction signature has already been processed")]
    DuplicateSignature,
    #[error("no bump produces a valid program address")]
    NoViableBump,
    #[error("malformed account data: {0}")]
    MalformedAccountData(String),
    #[error("ledger error: {0}")]
    Ledger(String),
}

impl ZkaaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ZkaaError::SaltTooLong(_) => ErrorKind::SaltTooLong,
            ZkaaError::EmailHashMismatch => ErrorKind::EmailHashMismatch,
            ZkaaError::AccountAlreadyInitialized(_) => ErrorKind::AccountAlreadyInitialized,
            ZkaaError::AccountNotInitialized(_) => ErrorKind::AccountNotInitialized,
            ZkaaError::SaltMismatch => ErrorKind::SaltMismatch,
            ZkaaError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            ZkaaError::MalformedProofOutputs(_) => ErrorKind::MalformedProofOutputs,
            ZkaaError::ProofNotVerified => ErrorKind::ProofNotVerified,
            ZkaaError::NetworkUnavailable(_) => ErrorKind::NetworkUnavailable,
            ZkaaError::InvalidInput(_) => ErrorKind::InvalidInput,
            ZkaaError::InvalidSignature => ErrorKind::InvalidSignature,
            ZkaaError::DuplicateSignature => ErrorKind::DuplicateSignature,
            ZkaaError::NoViableBump => ErrorKind::NoViableBump,
            ZkaaError::MalformedAccountData(_) => ErrorKind::MalformedAccountData,
            ZkaaError::Ledger(_) => ErrorKind::Ledger,
        }
    }

    /// Whether the operation may be re-attempted unchanged. Only transport
    /// failures qualify; callers must still never retry mutations.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ZkaaError::NetworkUnavailable(_))
    }
}

/// Machine-readable error code carried in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    SaltTooLong,
    EmailHashMismatch,
    AccountAlreadyInitialized,
    AccountNotInitialized,
    SaltMismatch,
    InsufficientBalance,
    MalformedProofOutputs,
    ProofNotVerified,
    NetworkUnavailable,
    InvalidInput,
    InvalidSignature,
    DuplicateSignature,
    NoViableBump,
    MalformedAccountData,
    #[serde(rename = "LEDGER_ERROR")]
    Ledger,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SaltTooLong => "SALT_TOO_LONG",
            ErrorKind::EmailHashMismatch => "EMAIL_HASH_MISMATCH",
            ErrorKind::AccountAlreadyInitialized => "ACCOUNT_ALREADY_INITIALIZED",
            ErrorKind::AccountNotInitialized => "ACCOUNT_NOT_INITIALIZED",
            ErrorKind::SaltMismatch => "SALT_MISMATCH",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::MalformedProofOutputs => "MALFORMED_PROOF_OUTPUTS",
            ErrorKind::ProofNotVerified => "PROOF_NOT_VERIFIED",
            ErrorKind::NetworkUnavailable => "NETWORK_UNAVAILABLE",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::InvalidSignature => "INVALID_SIGNATURE",
            ErrorKind::DuplicateSignature => "DUPLICATE_SIGNATURE",
            ErrorKind::NoViableBump => "NO_VIABLE_BUMP",
            ErrorKind::MalformedAccountData => "MALFORMED_ACCOUNT_DATA",
            ErrorKind::Ledger => "LEDGER_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
