//! Runtime proof verification.

use sha2::{Digest, Sha256};
use thiserror::Error;
use zkaa_common::{Proof, ZkaaError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("proof is empty")]
    Empty,
    #[error("proof does not commit to the public outputs under this program")]
    CommitmentMismatch,
}

impl From<VerifyError> for ZkaaError {
    fn from(_: VerifyError) -> Self {
        ZkaaError::ProofNotVerified
    }
}

/// Checks that a proof was produced by the expected circuit over its public
/// outputs. Says nothing about what the outputs claim.
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &Proof) -> Result<(), VerifyError>;
}

/// Accepts proofs whose bytes are `SHA-256(vkey_hash || public_outputs)`.
///
/// Used by local and dev deployments in place of a pairing check; the
/// verifying key hash still pins which circuit the outputs came from.
#[derive(Debug, Clone, Copy)]
pub struct CommitmentVerifier {
    program_vkey_hash: [u8; 32],
}

impl CommitmentVerifier {
    pub fn new(program_vkey_hash: [u8; 32]) -> Self {
        Self { program_vkey_hash }
    }

    pub fn program_vkey_hash(&self) -> &[u8; 32] {
        &self.program_vkey_hash
    }

    pub fn commitment(&self, public_outputs: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.program_vkey_hash);
        hasher.update(public_outputs);
        hasher.finalize().into()
    }

    /// Builds a proof this verifier accepts.
    pub fn seal(&self, public_outputs: Vec<u8>) -> Proof {
        Proof::new(self.commitment(&public_outputs).to_vec(), public_outputs)
    }
}

impl ProofVerifier for CommitmentVerifier {
    fn verify(&self, proof: &Proof) -> Result<(), VerifyError> {
        if proof.proof.is_empty() {
            return Err(VerifyError::Empty);
        }
        if proof.proof != self.commitment(&proof.public_outputs) {
            return Err(VerifyError::CommitmentMismatch);
        }
        Ok(())
    }
}
