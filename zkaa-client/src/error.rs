use thiserror::Error;
use zkaa_common::{ErrorKind, ZkaaError};

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected before any request was sent.
    #[error(transparent)]
    Local(#[from] ZkaaError),
    /// The ledger answered with an error body.
    #[error("{kind}: {message}")]
    Rejected { kind: ErrorKind, message: String },
    #[error("network error at {url}: {error}")]
    Network {
        url: String,
        status: Option<u16>,
        error: String,
    },
    #[error("unexpected response from {url}: {error}")]
    UnexpectedResponse { url: String, error: String },
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Local(err) => err.kind(),
            ClientError::Rejected { kind, .. } => *kind,
            ClientError::Network { .. } => ErrorKind::NetworkUnavailable,
            ClientError::UnexpectedResponse { .. } => ErrorKind::Ledger,
        }
    }
}
