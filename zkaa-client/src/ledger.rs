//! Client for the ledger HTTP API.

use std::time::Duration;

use reqwest::Url;
use serde_json::Value;
use tracing::info;
use zkaa_common::{
    api::{
        BalanceResponse, CreateAccountRequest, CreateAccountResponse, ExistsResponse,
        FaucetRequest, FaucetResponse, TransferRequest, TransferResponse,
    },
    Address, AddressDeriver, EmailHash, ErrorKind, Proof, Salt, UserAccount,
};

use crate::{
    error::ClientError,
    http::{decode, endpoint, parse_base_url, Request},
    signer::WalletSigner,
    validation::validate_transfer,
};

const LEDGER_TIMEOUT: Duration = Duration::from_secs(10);

/// Every method validates its inputs locally first, so `SaltTooLong` and
/// similar errors never cost a round-trip.
pub struct LedgerClient {
    base_url: Url,
    http: Request,
    deriver: AddressDeriver,
}

impl LedgerClient {
    pub fn new(base_url: &str, program_id: Address) -> Result<Self, ClientError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            http: Request::new(LEDGER_TIMEOUT),
            deriver: AddressDeriver::new(program_id),
        })
    }

    pub fn deriver(&self) -> &AddressDeriver {
        &self.deriver
    }

    /// Derives the account address locally.
    pub fn address(&self, email_hash: &EmailHash, salt: &str) -> Result<(Address, u8), ClientError> {
        let salt = Salt::new(salt)?;
        Ok(self.deriver.derive(email_hash, &salt)?)
    }

    fn account_url(&self, email_hash: &EmailHash, salt: &str, suffix: Option<&str>) -> Result<Url, ClientError> {
        let salt = Salt::new(salt)?;
        let hash = email_hash.to_string();
        let mut segments = vec!["accounts", hash.as_str(), salt.as_str()];
        segments.extend(suffix);
        endpoint(&self.base_url, &segments)
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        let url = endpoint(&self.base_url, &["health"])?;
        let response = self.http.send_idempotent(self.http.get(url)).await?;
        decode(response).await
    }

    pub async fn create_account(
        &self,
        email_hash: &EmailHash,
        salt: &str,
        proof: &Proof,
        signer: &WalletSigner,
    ) -> Result<CreateAccountResponse, ClientError> {
        let salt = Salt::new(salt)?;
        let body = CreateAccountRequest {
            email_hash: *email_hash,
            salt: salt.to_string(),
            proof: proof.clone(),
            relayer: signer.authorize_create(email_hash, &salt),
        };

        let url = endpoint(&self.base_url, &["accounts"])?;
        let response = self.http.send_once(self.http.post(url).json(&body)).await?;
        let created: CreateAccountResponse = decode(response).await?;
        info!(address = %created.address, salt = %salt, "account created");
        Ok(created)
    }

    pub async fn transfer(
        &self,
        email_hash: &EmailHash,
        salt: &str,
        proof: &Proof,
        amount: u64,
        destination: &Address,
        signer: &WalletSigner,
    ) -> Result<TransferResponse, ClientError> {
        let salt = Salt::new(salt)?;
        let (source, _) = self.deriver.derive(email_hash, &salt)?;
        validate_transfer(&source, destination, amount)?;

        let body = TransferRequest {
            email_hash: *email_hash,
            salt: salt.to_string(),
            proof: proof.clone(),
            amount,
            destination: destination.to_string(),
            relayer: signer.authorize_transfer(email_hash, &salt, amount, destination),
        };

        let url = endpoint(&self.base_url, &["transfers"])?;
        let response = self.http.send_once(self.http.post(url).json(&body)).await?;
        let receipt: TransferResponse = decode(response).await?;
        info!(source = %receipt.source, destination = %receipt.destination, amount, "transfer confirmed");
        Ok(receipt)
    }

    pub async fn balance(&self, email_hash: &EmailHash, salt: &str) -> Result<BalanceResponse, ClientError> {
        let url = self.account_url(email_hash, salt, Some("balance"))?;
        let response = self.http.send_idempotent(self.http.get(url)).await?;
        decode(response).await
    }

    pub async fn exists(&self, email_hash: &EmailHash, salt: &str) -> Result<bool, ClientError> {
        let url = self.account_url(email_hash, salt, Some("exists"))?;
        let response = self.http.send_idempotent(self.http.get(url)).await?;
        let exists: ExistsResponse = decode(response).await?;
        Ok(exists.exists)
    }

    /// Reads the stored record; `None` if the account was never created.
    pub async fn account(
        &self,
        email_hash: &EmailHash,
        salt: &str,
    ) -> Result<Option<UserAccount>, ClientError> {
        let url = self.account_url(email_hash, salt, None)?;
        let response = self.http.send_idempotent(self.http.get(url)).await?;
        match decode(response).await {
            Ok(account) => Ok(Some(account)),
            Err(ClientError::Rejected {
                kind: ErrorKind::AccountNotInitialized,
                ..
            }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deposits through the ledger faucet, where enabled.
    pub async fn fund(&self, address: &Address, amount: u64) -> Result<FaucetResponse, ClientError> {
        let body = FaucetRequest {
            address: *address,
            amount,
        };
        let url = endpoint(&self.base_url, &["faucet"])?;
        let response = self.http.send_once(self.http.post(url).json(&body)).await?;
        decode(response).await
    }
}
