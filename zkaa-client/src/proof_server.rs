//! Client for the external JWT proving service.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use zkaa_common::{Proof, ZkaaError};

use crate::{
    error::ClientError,
    http::{decode, endpoint, parse_base_url, Request},
};

/// Proving a JWT takes minutes on CPU provers.
const PROVE_TIMEOUT: Duration = Duration::from_secs(600);

/// The three dot-separated parts of a compact JWT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtParts {
    pub header: String,
    pub payload: String,
    pub signature: String,
}

impl JwtParts {
    pub fn parse(token: &str) -> Result<Self, ZkaaError> {
        let mut parts = token.trim().split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(header), Some(payload), Some(signature), None)
                if !header.is_empty() && !payload.is_empty() && !signature.is_empty() =>
            {
                Ok(Self {
                    header: header.to_string(),
                    payload: payload.to_string(),
                    signature: signature.to_string(),
                })
            }
            _ => Err(ZkaaError::InvalidInput(
                "token must have three non-empty dot-separated parts".into(),
            )),
        }
    }
}

#[derive(Serialize)]
struct ProveRequest<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
    public_key: &'a Value,
}

#[derive(Deserialize)]
struct ProveResponse {
    proof: String,
    verification_key: String,
    public_outputs_bytes: String,
    proof_size: usize,
}

#[derive(Debug, Clone)]
pub struct ProverOutput {
    pub proof: Proof,
    pub verification_key: String,
    pub proof_size: usize,
}

/// Proofs from this service are untrusted until the ledger verifies them.
pub struct ProofServerClient {
    base_url: Url,
    http: Request,
}

impl ProofServerClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            http: Request::new(PROVE_TIMEOUT),
        })
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        let url = endpoint(&self.base_url, &["health"])?;
        let response = self.http.send_idempotent(self.http.get(url)).await?;
        decode(response).await
    }

    /// Requests a proof for `jwt` signed by the issuer key `public_key`
    /// (a JWK).
    pub async fn prove(&self, jwt: &JwtParts, public_key: &Value) -> Result<ProverOutput, ClientError> {
        let url = endpoint(&self.base_url, &["prove"])?;
        let body = ProveRequest {
            header: &jwt.header,
            payload: &jwt.payload,
            signature: &jwt.signature,
            public_key,
        };
        let response = self
            .http
            .send_once(self.http.post(url.clone()).json(&body))
            .await?;
        let proved: ProveResponse = decode(response).await?;

        let unhex = |field: &str, value: &str| {
            hex::decode(value.trim_start_matches("0x")).map_err(|e| ClientError::UnexpectedResponse {
                url: url.to_string(),
                error: format!("{field} is not hex: {e}"),
            })
        };
        let proof = Proof::new(
            unhex("proof", &proved.proof)?,
            unhex("public_outputs_bytes", &proved.public_outputs_bytes)?,
        );

        info!(proof_size = proved.proof_size, "proof generated");
        Ok(ProverOutput {
            proof,
            verification_key: proved.verification_key,
            proof_size: proved.proof_size,
        })
    }
}
