use std::net::SocketAddr;

use clap::Parser;
use zkaa_common::{parse_hex32, Address, DEFAULT_PROGRAM_ID};

use crate::authorizer::ClaimsPolicy;

/// Verifying key hash of the JWT circuit the ledger accepts by default.
pub const DEFAULT_VKEY_HASH: &str =
    "0x0064ed2fa8374e88956274696c857993416e36810a247a310a3b084804b49822";

#[derive(Debug, Clone, Parser)]
#[command(name = "zkaa-ledger", version, about = "Proof-gated account ledger service")]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "ZKAA_LISTEN", default_value = "127.0.0.1:3000")]
    pub listen: SocketAddr,

    /// Postgres connection string; ledger state stays in memory when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "ZKAA_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Program identity used for address derivation (hex)
    #[arg(long, env = "ZKAA_PROGRAM_ID", default_value = DEFAULT_PROGRAM_ID)]
    pub program_id: Address,

    /// Verifying key hash of the accepted circuit (hex)
    #[arg(long, env = "ZKAA_VKEY_HASH", default_value = DEFAULT_VKEY_HASH, value_parser = parse_hex32)]
    pub vkey_hash: [u8; 32],

    /// Expose POST /faucet for external deposits
    #[arg(long, env = "ZKAA_ENABLE_FAUCET")]
    pub enable_faucet: bool,

    /// Token issuers to accept; any issuer when empty
    #[arg(long = "allowed-issuer", env = "ZKAA_ALLOWED_ISSUERS", value_delimiter = ',')]
    pub allowed_issuers: Vec<String>,

    /// Token audience to require
    #[arg(long, env = "ZKAA_AUDIENCE")]
    pub audience: Option<String>,
}

impl Config {
    pub fn policy(&self) -> ClaimsPolicy {
        ClaimsPolicy::new(self.allowed_issuers.clone(), self.audience.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["zkaa-ledger"]).unwrap();
        assert_eq!(config.listen.port(), 3000);
        assert_eq!(config.vkey_hash[..2], [0x00, 0x64]);
        assert_eq!(config.program_id.to_string(), DEFAULT_PROGRAM_ID);
    }

    #[test]
    fn test_issuer_list() {
        let config = Config::try_parse_from([
            "zkaa-ledger",
            "--allowed-issuer",
            "https://accounts.google.com,https://login.microsoftonline.com",
            "--enable-faucet",
        ])
        .unwrap();
        assert_eq!(config.allowed_issuers.len(), 2);
        assert!(config.enable_faucet);
    }

    #[test]
    fn test_bad_vkey_hash() {
        assert!(Config::try_parse_from(["zkaa-ledger", "--vkey-hash", "0x1234"]).is_err());
    }
}
