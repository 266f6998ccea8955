//! Client side of the proof-gated ledger: prover and ledger HTTP clients,
//! fee payer signing, session state and background balance refresh.

pub mod error;
mod http;
pub mod ledger;
pub mod proof_server;
pub mod reconciler;
pub mod session;
pub mod signer;
pub mod validation;

pub use error::ClientError;
pub use ledger::LedgerClient;
pub use proof_server::{JwtParts, ProofServerClient, ProverOutput};
pub use reconciler::{BalanceReconciler, BalanceSource, ReconcilerHandle, TrackedAccount};
pub use session::Session;
pub use signer::WalletSigner;
