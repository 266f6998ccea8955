//! On-ledger account record (layout v1) and rent accounting.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{EmailHash, Salt, ZkaaError, MAX_SALT_LEN};

const DISCRIMINATOR_PREIMAGE: &[u8] = b"account:UserAccountV1";

/// Record size used for rent: discriminator + email hash + salt length
/// prefix + longest salt + bump.
pub const ACCOUNT_SPACE: usize = 8 + 32 + 4 + MAX_SALT_LEN + 1;

pub fn discriminator() -> [u8; 8] {
    let hash = Sha256::digest(DISCRIMINATOR_PREIMAGE);
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

/// Data stored at a derived address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    pub email_hash: EmailHash,
    pub salt: Salt,
    pub bump: u8,
}

impl UserAccount {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ACCOUNT_SPACE);
        out.extend_from_slice(&discriminator());
        out.extend_from_slice(self.email_hash.as_bytes());
        out.extend_from_slice(&(self.salt.len() as u32).to_le_bytes());
        out.extend_from_slice(self.salt.as_bytes());
        out.push(self.bump);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ZkaaError> {
        let malformed = |msg: &str| ZkaaError::MalformedAccountData(msg.to_string());

        if bytes.len() < 8 + 32 + 4 + 1 {
            return Err(malformed("record too short"));
        }
        if bytes[..8] != discriminator() {
            return Err(malformed("unknown discriminator"));
        }
        let mut email_hash = [0u8; 32];
        email_hash.copy_from_slice(&bytes[8..40]);
        let salt_len = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]) as usize;
        if salt_len > MAX_SALT_LEN || bytes.len() < 44 + salt_len + 1 {
            return Err(malformed("salt length out of range"));
        }
        let salt = std::str::from_utf8(&bytes[44..44 + salt_len])
            .map_err(|_| malformed("salt is not UTF-8"))?;

        Ok(Self {
            email_hash: EmailHash(email_hash),
            salt: Salt::new(salt)?,
            bump: bytes[44 + salt_len],
        })
    }
}

/// Rent schedule of the ledger: a record is persisted only while it holds the
/// two-year rent for its size plus the fixed storage overhead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rent {
    pub lamports_per_byte_year: u64,
    pub exemption_threshold_years: u64,
}

impl Rent {
    pub const STORAGE_OVERHEAD: u64 = 128;

    pub fn minimum_balance(&self, data_len: usize) -> u64 {
        (Self::STORAGE_OVERHEAD + data_len as u64)
            * self.lamports_per_byte_year
            * self.exemption_threshold_years
    }

    /// Reserve every user account must keep.
    pub fn account_reserve(&self) -> u64 {
        self.minimum_balance(ACCOUNT_SPACE)
    }
}

impl Default for Rent {
    fn default() -> Self {
        Self {
            lamports_per_byte_year: 3480,
            exemption_threshold_years: 2,
        }
    }
}

/// Balance above the rent reserve; never negative.
pub fn available_balance(raw_lamports: u64, reserve: u64) -> u64 {
    raw_lamports.saturating_sub(reserve)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(salt: &str) -> UserAccount {
        UserAccount {
            email_hash: EmailHash([3u8; 32]),
            salt: Salt::new(salt).unwrap(),
            bump: 254,
        }
    }

    #[test]
    fn test_space_and_reserve() {
        assert_eq!(ACCOUNT_SPACE, 77);
        assert_eq!(Rent::default().account_reserve(), 1_426_800);
    }

    #[test]
    fn test_record_layout() {
        let bytes = record("default").to_bytes();
        assert_eq!(&bytes[..8], &discriminator());
        assert_eq!(&bytes[40..44], &7u32.to_le_bytes());
        assert_eq!(&bytes[44..51], b"default");
        assert_eq!(bytes[51], 254);
        assert!(bytes.len() <= ACCOUNT_SPACE);
        assert_eq!(UserAccount::from_bytes(&bytes).unwrap(), record("default"));
    }

    #[test]
    fn test_max_salt_fills_space() {
        let bytes = record(&"s".repeat(MAX_SALT_LEN)).to_bytes();
        assert_eq!(bytes.len(), ACCOUNT_SPACE);
    }

    #[test]
    fn test_rejects_foreign_layout() {
        let mut bytes = record("default").to_bytes();
        bytes[0] ^= 0xff;
        assert!(matches!(
            UserAccount::from_bytes(&bytes),
            Err(ZkaaError::MalformedAccountData(_))
        ));

        let mut bytes = record("default").to_bytes();
        bytes[40..44].copy_from_slice(&200u32.to_le_bytes());
        assert!(UserAccount::from_bytes(&bytes).is_err());

        assert!(UserAccount::from_bytes(&bytes[..20]).is_err());
    }

    #[test]
    fn test_available_balance_floors_at_zero() {
        let reserve = Rent::default().account_reserve();
        assert_eq!(available_balance(0, reserve), 0);
        assert_eq!(available_balance(reserve, reserve), 0);
        assert_eq!(available_balance(reserve + 5, reserve), 5);
    }
}
