//! Decoding of the public outputs committed by the JWT prover.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! u32 x 8        email identity digest fragments
//! u32 + bytes    subject  (UTF-8)
//! u32 + bytes    issuer   (UTF-8)
//! u32 + bytes    audience (UTF-8)
//! u8             verified (nonzero = true)
//! ```
//!
//! Bytes after the `verified` flag are ignored.

use serde::Serialize;
use thiserror::Error;

use crate::{EmailHash, ZkaaError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("buffer truncated reading {field}: need {needed} bytes, {remaining} remaining")]
    Truncated {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },
    #[error("{field} declares {declared} bytes but only {remaining} remain")]
    LengthOverflow {
        field: &'static str,
        declared: usize,
        remaining: usize,
    },
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

impl From<DecodeError> for ZkaaError {
    fn from(err: DecodeError) -> Self {
        ZkaaError::MalformedProofOutputs(err.to_string())
    }
}

/// Identity claims carried in a proof's public outputs.
///
/// Only obtainable by decoding; the default value is the unauthenticated
/// identity (zero hash, `verified = false`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Claims {
    email_hash: EmailHash,
    subject: String,
    issuer: String,
    audience: String,
    verified: bool,
}

impl Claims {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);

        let mut fragments = [0u32; 8];
        for fragment in fragments.iter_mut() {
            *fragment = reader.u32("email_hash")?;
        }
        let subject = reader.string("subject")?;
        let issuer = reader.string("issuer")?;
        let audience = reader.string("audience")?;
        let verified = reader.take("verified", 1)?[0] != 0;

        Ok(Self {
            email_hash: EmailHash::from_fragments(fragments),
            subject,
            issuer,
            audience,
            verified,
        })
    }

    /// Fail-safe decode: any structural error yields the unauthenticated
    /// default so a malformed proof can never pass as a valid one.
    pub fn decode_or_unverified(bytes: &[u8]) -> Self {
        Self::decode(bytes).unwrap_or_default()
    }

    pub fn email_hash(&self) -> &EmailHash {
        &self.email_hash
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn verified(&self) -> bool {
        self.verified
    }
}

/// Encodable form of the prover's public outputs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PublicOutputs {
    pub email_hash: EmailHash,
    pub subject: String,
    pub issuer: String,
    pub audience: String,
    pub verified: bool,
}

impl PublicOutputs {
    pub fn encode(&self) -> Vec<u8> {
        let strings = self.subject.len() + self.issuer.len() + self.audience.len();
        let mut out = Vec::with_capacity(32 + 12 + strings + 1);
        for fragment in self.email_hash.fragments() {
            out.extend_from_slice(&fragment.to_le_bytes());
        }
        for s in [&self.subject, &self.issuer, &self.audience] {
            out.extend_from_slice(&(s.len() as u32).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        out.push(u8::from(self.verified));
        out
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                field,
                needed: n,
                remaining: self.remaining(),
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let b = self.take(field, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let declared = self.u32(field)? as usize;
        if declared > self.remaining() {
            return Err(DecodeError::LengthOverflow {
                field,
                declared,
                remaining: self.remaining(),
            });
        }
        let bytes = self.take(field, declared)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { field })
    }
}
