use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub mod account;
pub mod api;
pub mod claims;
pub mod derive;
pub mod error;
pub mod message;

pub use account::{Rent, UserAccount, ACCOUNT_SPACE};
pub use claims::{Claims, DecodeError, PublicOutputs};
pub use derive::AddressDeriver;
pub use error::{ErrorKind, ZkaaError};
pub use message::RelayerAuth;

/// Longest salt accepted for address derivation, in bytes.
pub const MAX_SALT_LEN: usize = 32;

/// Raw ledger units per display unit.
pub const LAMPORTS_PER_UNIT: u64 = 1_000_000_000;

/// Program identity used when a deployment does not configure its own.
pub const DEFAULT_PROGRAM_ID: &str =
    "5a4b41412d70726f6772616d2d76310000000000000000000000000000000001";

/// A 32-byte ledger address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(#[serde(with = "hex_array")] pub [u8; 32]);

impl Address {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = ZkaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex32(s)
            .map(Self)
            .map_err(|e| ZkaaError::InvalidInput(format!("invalid address: {e}")))
    }
}

/// Identity commitment of an email address, as committed by the prover.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailHash(#[serde(with = "hex_array")] pub [u8; 32]);

impl EmailHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Splits the hash into the eight little-endian words the prover commits.
    pub fn fragments(&self) -> [u32; 8] {
        let mut words = [0u32; 8];
        for (word, chunk) in words.iter_mut().zip(self.0.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        words
    }

    pub fn from_fragments(words: [u32; 8]) -> Self {
        let mut bytes = [0u8; 32];
        for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Self(bytes)
    }
}

impl fmt::Display for EmailHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for EmailHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EmailHash({})", hex::encode(self.0))
    }
}

impl FromStr for EmailHash {
    type Err = ZkaaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hex32(s)
            .map(Self)
            .map_err(|e| ZkaaError::InvalidInput(format!("invalid email hash: {e}")))
    }
}

/// Caller-chosen salt letting one identity own several accounts.
///
/// A `Salt` can only be built through [`Salt::new`], so holding one means the
/// length bound has already been checked.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Salt(String);

impl Salt {
    pub fn new(salt: impl Into<String>) -> Result<Self, ZkaaError> {
        let salt = salt.into();
        if salt.len() > MAX_SALT_LEN {
            return Err(ZkaaError::SaltTooLong(salt.len()));
        }
        Ok(Self(salt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<String> for Salt {
    type Error = ZkaaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Salt> for String {
    fn from(salt: Salt) -> Self {
        salt.0
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fee-payer signature; doubles as the transaction id on the ledger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxSignature(#[serde(with = "hex_array")] pub [u8; 64]);

impl fmt::Display for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxSignature({})", hex::encode(self.0))
    }
}

/// Proof as returned by the external prover: opaque verifier bytes plus the
/// public outputs the proof commits to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    #[serde(with = "hex_vec")]
    pub proof: Vec<u8>,
    #[serde(with = "hex_vec")]
    pub public_outputs: Vec<u8>,
}

impl Proof {
    pub fn new(proof: Vec<u8>, public_outputs: Vec<u8>) -> Self {
        Self {
            proof,
            public_outputs,
        }
    }

    /// Decodes the public outputs, degrading to unverified claims on any
    /// structural error.
    pub fn claims(&self) -> Claims {
        Claims::decode_or_unverified(&self.public_outputs)
    }
}

impl fmt::Debug for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proof")
            .field("proof_len", &self.proof.len())
            .field("public_outputs", &hex::encode(&self.public_outputs))
            .finish()
    }
}

/// Converts raw ledger units into display units.
pub fn lamports_to_units(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_UNIT as f64
}

/// Parses a 32-byte hex string, with or without a `0x` prefix.
pub fn parse_hex32(s: &str) -> Result<[u8; 32], String> {
    let cleaned = s.trim().trim_start_matches("0x");
    let bytes = hex::decode(cleaned).map_err(|e| e.to_string())?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("expected 32 bytes but got {len}"))
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)?;
        let len = bytes.len();
        bytes.try_into().map_err(|_| {
            serde::de::Error::custom(format!("Expected {} bytes but got {}", N, len))
        })
    }
}

mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_bounds() {
        assert!(Salt::new("default").is_ok());
        assert!(Salt::new("a".repeat(MAX_SALT_LEN)).is_ok());
        assert_eq!(
            Salt::new("a".repeat(MAX_SALT_LEN + 1)),
            Err(ZkaaError::SaltTooLong(MAX_SALT_LEN + 1))
        );
        // multi-byte characters count by byte, not by char
        assert!(matches!(
            Salt::new("é".repeat(17)),
            Err(ZkaaError::SaltTooLong(34))
        ));
    }

    #[test]
    fn test_salt_rejected_when_deserialized() {
        let long = serde_json::to_string(&"x".repeat(33)).unwrap();
        assert!(serde_json::from_str::<Salt>(&long).is_err());
        let salt: Salt = serde_json::from_str("\"savings\"").unwrap();
        assert_eq!(salt.as_str(), "savings");
    }

    #[test]
    fn test_email_hash_fragments() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let hash = EmailHash(bytes);
        let words = hash.fragments();
        assert_eq!(words[0], u32::from_le_bytes([0, 1, 2, 3]));
        assert_eq!(EmailHash::from_fragments(words), hash);
    }

    #[test]
    fn test_address_parsing() {
        let addr = Address([7u8; 32]);
        let parsed: Address = addr.to_string().parse().unwrap();
        assert_eq!(parsed, addr);
        let prefixed: Address = format!("0x{}", addr).parse().unwrap();
        assert_eq!(prefixed, addr);
        assert!(matches!(
            "abcd".parse::<Address>(),
            Err(ZkaaError::InvalidInput(_))
        ));
        assert!("zz".repeat(32).parse::<Address>().is_err());
    }

    #[test]
    fn test_proof_json_is_hex() {
        let proof = Proof::new(vec![0xab, 0xcd], vec![0x01]);
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["proof"], "abcd");
        assert_eq!(json["public_outputs"], "01");
        let back: Proof = serde_json::from_value(json).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn test_lamports_to_units() {
        assert_eq!(lamports_to_units(500_000_000), 0.5);
        assert_eq!(lamports_to_units(0), 0.0);
    }
}
