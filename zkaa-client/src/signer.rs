use std::fmt;

use ed25519_dalek::{Signer, SigningKey};
use rand::{rngs::OsRng, RngCore};
use zkaa_common::{
    message, parse_hex32, Address, EmailHash, RelayerAuth, Salt, TxSignature, ZkaaError,
};

/// Fee payer key. Its signatures make a request tamper-evident and give the
/// ledger a transaction id; they grant no authority over any account.
pub struct WalletSigner {
    key: SigningKey,
}

impl WalletSigner {
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_bytes(secret: &[u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    pub fn from_hex(secret: &str) -> Result<Self, ZkaaError> {
        parse_hex32(secret)
            .map(|bytes| Self::from_bytes(&bytes))
            .map_err(|e| ZkaaError::InvalidInput(format!("invalid signing key: {e}")))
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    pub fn address(&self) -> Address {
        Address(self.key.verifying_key().to_bytes())
    }

    pub fn sign(&self, digest: &[u8; 32], nonce: u64) -> RelayerAuth {
        RelayerAuth {
            fee_payer: self.address(),
            nonce,
            signature: TxSignature(self.key.sign(digest).to_bytes()),
        }
    }

    /// Signs an account creation under a fresh random nonce.
    pub fn authorize_create(&self, email_hash: &EmailHash, salt: &Salt) -> RelayerAuth {
        let nonce = OsRng.next_u64();
        let digest = message::create_account_digest(email_hash, salt, &self.address(), nonce);
        self.sign(&digest, nonce)
    }

    pub fn authorize_transfer(
        &self,
        email_hash: &EmailHash,
        salt: &Salt,
        amount: u64,
        destination: &Address,
    ) -> RelayerAuth {
        let nonce = OsRng.next_u64();
        let digest = message::transfer_digest(
            email_hash,
            salt,
            amount,
            destination,
            &self.address(),
            nonce,
        );
        self.sign(&digest, nonce)
    }
}

impl fmt::Debug for WalletSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletSigner")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
