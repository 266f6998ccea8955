//! Messages signed by the fee payer.
//!
//! The fee payer only relays; its signature binds the operation fields so a
//! relayed request cannot be altered in flight and doubles as the transaction
//! id. It carries no spending authority.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Address, EmailHash, Salt, TxSignature, ZkaaError};

const CREATE_ACCOUNT_TAG: &[u8] = b"zkaa:create_account:v1";
const TRANSFER_TAG: &[u8] = b"zkaa:transfer:v1";

/// Fee payer attestation attached to every mutating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayerAuth {
    pub fee_payer: Address,
    pub nonce: u64,
    pub signature: TxSignature,
}

impl RelayerAuth {
    pub fn verify(&self, digest: &[u8; 32]) -> Result<(), ZkaaError> {
        let key = VerifyingKey::from_bytes(self.fee_payer.as_bytes())
            .map_err(|_| ZkaaError::InvalidSignature)?;
        let signature = Signature::from_bytes(&self.signature.0);
        key.verify(digest, &signature)
            .map_err(|_| ZkaaError::InvalidSignature)
    }
}

pub fn create_account_digest(
    email_hash: &EmailHash,
    salt: &Salt,
    fee_payer: &Address,
    nonce: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(CREATE_ACCOUNT_TAG);
    hasher.update(email_hash.as_bytes());
    hasher.update((salt.len() as u32).to_le_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(fee_payer.as_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}

pub fn transfer_digest(
    email_hash: &EmailHash,
    salt: &Salt,
    amount: u64,
    destination: &Address,
    fee_payer: &Address,
    nonce: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(TRANSFER_TAG);
    hasher.update(email_hash.as_bytes());
    hasher.update((salt.len() as u32).to_le_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(amount.to_le_bytes());
    hasher.update(destination.as_bytes());
    hasher.update(fee_payer.as_bytes());
    hasher.update(nonce.to_le_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed(key: &SigningKey, digest: &[u8; 32], nonce: u64) -> RelayerAuth {
        RelayerAuth {
            fee_payer: Address(key.verifying_key().to_bytes()),
            nonce,
            signature: TxSignature(key.sign(digest).to_bytes()),
        }
    }

    #[test]
    fn test_valid_signature() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let payer = Address(key.verifying_key().to_bytes());
        let salt = Salt::new("default").unwrap();
        let digest = create_account_digest(&EmailHash([2u8; 32]), &salt, &payer, 7);
        assert!(signed(&key, &digest, 7).verify(&digest).is_ok());
    }

    #[test]
    fn test_tampered_fields_rejected() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let payer = Address(key.verifying_key().to_bytes());
        let salt = Salt::new("default").unwrap();
        let digest = transfer_digest(&EmailHash([2u8; 32]), &salt, 100, &Address([3u8; 32]), &payer, 1);
        let auth = signed(&key, &digest, 1);

        // Tamper with the amount after signing
        let tampered = transfer_digest(&EmailHash([2u8; 32]), &salt, 200, &Address([3u8; 32]), &payer, 1);
        assert_eq!(auth.verify(&tampered), Err(ZkaaError::InvalidSignature));
    }

    #[test]
    fn test_wrong_fee_payer_rejected() {
        let key = SigningKey::from_bytes(&[1u8; 32]);
        let other = SigningKey::from_bytes(&[4u8; 32]);
        let salt = Salt::new("default").unwrap();
        let digest = create_account_digest(&EmailHash([2u8; 32]), &salt, &Address([0u8; 32]), 0);
        let mut auth = signed(&key, &digest, 0);
        auth.fee_payer = Address(other.verifying_key().to_bytes());
        assert_eq!(auth.verify(&digest), Err(ZkaaError::InvalidSignature));
    }

    #[test]
    fn test_salt_boundary_is_unambiguous() {
        let payer = Address([5u8; 32]);
        let a = create_account_digest(&EmailHash([0u8; 32]), &Salt::new("ab").unwrap(), &payer, 0);
        let b = create_account_digest(&EmailHash([0u8; 32]), &Salt::new("a").unwrap(), &payer, 0);
        assert_ne!(a, b);
    }
}
