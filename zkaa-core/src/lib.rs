pub mod api;
pub mod authorizer;
pub mod config;
pub mod error;
pub mod registry;
pub mod state;
pub mod verifier;

pub use api::router;
pub use authorizer::{ClaimsPolicy, TransferAuthorizer};
pub use config::Config;
pub use error::AppError;
pub use registry::{AccountRegistry, MemoryRegistry, PgRegistry};
pub use state::AppState;
pub use verifier::{CommitmentVerifier, ProofVerifier, VerifyError};

#[cfg(test)]
mod tests;
