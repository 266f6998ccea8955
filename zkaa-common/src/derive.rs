//! Program-derived account addresses.
//!
//! An account address is `SHA-256(seeds.. || bump || program_id || marker)`
//! where the seeds are `"user_account"`, the email hash and the salt. Points
//! on the ed25519 curve could have a private key, so the bump is searched
//! downwards from 255 until the hash falls off the curve.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use crate::{Address, EmailHash, Salt, ZkaaError};

pub const ACCOUNT_SEED: &[u8] = b"user_account";
const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Derives account addresses for one program deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressDeriver {
    program_id: Address,
}

impl AddressDeriver {
    pub fn new(program_id: Address) -> Self {
        Self { program_id }
    }

    pub fn program_id(&self) -> &Address {
        &self.program_id
    }

    /// Returns the account address for `(email_hash, salt)` and the bump that
    /// produced it.
    pub fn derive(&self, email_hash: &EmailHash, salt: &Salt) -> Result<(Address, u8), ZkaaError> {
        find_program_address(
            &[ACCOUNT_SEED, email_hash.as_bytes(), salt.as_bytes()],
            &self.program_id,
        )
    }

    /// Recomputes the address for a known bump, as the ledger does when it
    /// checks a stored record.
    pub fn address_with_bump(
        &self,
        email_hash: &EmailHash,
        salt: &Salt,
        bump: u8,
    ) -> Option<Address> {
        create_program_address(
            &[ACCOUNT_SEED, email_hash.as_bytes(), salt.as_bytes(), &[bump]],
            &self.program_id,
        )
    }
}

pub fn create_program_address(seeds: &[&[u8]], program_id: &Address) -> Option<Address> {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);
    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        None
    } else {
        Some(Address(hash))
    }
}

pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Address,
) -> Result<(Address, u8), ZkaaError> {
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump = seeds.to_vec();
        with_bump.push(&bump_seed);
        if let Some(address) = create_program_address(&with_bump, program_id) {
            return Ok((address, bump));
        }
    }
    Err(ZkaaError::NoViableBump)
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::OsRng, RngCore};

    fn deriver() -> AddressDeriver {
        AddressDeriver::new(crate::DEFAULT_PROGRAM_ID.parse().unwrap())
    }

    fn random_hash() -> EmailHash {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        EmailHash(bytes)
    }

    #[test]
    fn test_derive_is_deterministic() {
        let deriver = deriver();
        let hash = EmailHash(Sha256::digest(b"user@example.com").into());
        let salt = Salt::new("default").unwrap();
        let first = deriver.derive(&hash, &salt).unwrap();
        for _ in 0..8 {
            assert_eq!(deriver.derive(&hash, &salt).unwrap(), first);
        }
    }

    #[test]
    fn test_derived_address_is_off_curve() {
        let deriver = deriver();
        for _ in 0..32 {
            let (address, _) = deriver
                .derive(&random_hash(), &Salt::new("default").unwrap())
                .unwrap();
            assert!(!is_on_curve(address.as_bytes()));
        }
    }

    #[test]
    fn test_bump_reproduces_address() {
        let deriver = deriver();
        let hash = random_hash();
        let salt = Salt::new("savings").unwrap();
        let (address, bump) = deriver.derive(&hash, &salt).unwrap();
        assert_eq!(deriver.address_with_bump(&hash, &salt, bump), Some(address));
    }

    #[test]
    fn test_distinct_inputs_distinct_addresses() {
        let deriver = deriver();
        let hash = random_hash();
        let salts = ["default", "savings", "business", ""];
        let mut seen = std::collections::HashSet::new();
        for salt in salts {
            let (address, _) = deriver.derive(&hash, &Salt::new(salt).unwrap()).unwrap();
            assert!(seen.insert(address), "salt {salt:?} collided");
        }
        let (other, _) = deriver
            .derive(&random_hash(), &Salt::new("default").unwrap())
            .unwrap();
        assert!(seen.insert(other));
    }

    #[test]
    fn test_program_id_separates_deployments() {
        let hash = random_hash();
        let salt = Salt::new("default").unwrap();
        let (a, _) = deriver().derive(&hash, &salt).unwrap();
        let (b, _) = AddressDeriver::new(Address([9u8; 32]))
            .derive(&hash, &salt)
            .unwrap();
        assert_ne!(a, b);
    }
}
