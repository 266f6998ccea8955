use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use zkaa_common::{api::ErrorBody, ErrorKind, ZkaaError};

/// Handler error. Storage failures arrive as `ZkaaError::Ledger`, mapped by
/// the registry.
#[derive(Debug)]
pub enum AppError {
    Protocol(ZkaaError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Protocol(err) => err.kind(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::SaltTooLong | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::ProofNotVerified
            | ErrorKind::MalformedProofOutputs
            | ErrorKind::InvalidSignature => StatusCode::UNAUTHORIZED,
            ErrorKind::AccountNotInitialized => StatusCode::NOT_FOUND,
            ErrorKind::AccountAlreadyInitialized | ErrorKind::DuplicateSignature => {
                StatusCode::CONFLICT
            }
            ErrorKind::InsufficientBalance
            | ErrorKind::EmailHashMismatch
            | ErrorKind::SaltMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::NetworkUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::NoViableBump | ErrorKind::MalformedAccountData | ErrorKind::Ledger => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.kind();
        let message = match self {
            AppError::Protocol(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code = %code, "{}", message);
        } else {
            tracing::debug!(code = %code, "{}", message);
        }

        (status, Json(ErrorBody { error: message, code })).into_response()
    }
}

impl From<ZkaaError> for AppError {
    fn from(err: ZkaaError) -> Self {
        AppError::Protocol(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zkaa_common::Address;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ZkaaError::SaltTooLong(40), StatusCode::BAD_REQUEST),
            (ZkaaError::ProofNotVerified, StatusCode::UNAUTHORIZED),
            (ZkaaError::InvalidSignature, StatusCode::UNAUTHORIZED),
            (
                ZkaaError::AccountNotInitialized(Address::default()),
                StatusCode::NOT_FOUND,
            ),
            (
                ZkaaError::AccountAlreadyInitialized(Address::default()),
                StatusCode::CONFLICT,
            ),
            (ZkaaError::DuplicateSignature, StatusCode::CONFLICT),
            (
                ZkaaError::InsufficientBalance {
                    required: 2,
                    available: 1,
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ZkaaError::EmailHashMismatch, StatusCode::UNPROCESSABLE_ENTITY),
            (ZkaaError::Ledger("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }

    #[test]
    fn test_ledger_error_body() {
        let err = AppError::from(ZkaaError::Ledger("connection reset".into()));
        assert_eq!(err.kind(), ErrorKind::Ledger);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
