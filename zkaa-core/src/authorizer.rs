//! Proof-gated authorization of account operations.
//!
//! Authorization moves through typestates: a [`TransferAuthorizer`] is
//! unauthenticated, [`TransferAuthorizer::authenticate`] yields an
//! [`Authenticated`] session holding decoded claims, and selecting a salt
//! yields an [`AccountSelected`] bound to one derived address. Only the last
//! state can create accounts or move funds, and each of those calls consumes
//! it. A failure returns the error and leaves nothing mutated.
//!
//! Spending authority comes from the proof alone. The fee payer signature is
//! checked by the caller for request integrity and is never consulted here.

use serde::Serialize;
use tracing::{info, warn};
use zkaa_common::{
    Address, AddressDeriver, Claims, EmailHash, Proof, Salt, TxSignature, UserAccount, ZkaaError,
};

use crate::{
    registry::{AccountCreation, AccountRegistry, LedgerTransfer},
    verifier::ProofVerifier,
};

/// Which token issuers and audience a deployment accepts. Empty fields
/// accept anything.
#[derive(Debug, Clone, Default)]
pub struct ClaimsPolicy {
    allowed_issuers: Vec<String>,
    audience: Option<String>,
}

impl ClaimsPolicy {
    pub fn new(allowed_issuers: Vec<String>, audience: Option<String>) -> Self {
        Self {
            allowed_issuers,
            audience,
        }
    }

    pub fn admits(&self, claims: &Claims) -> bool {
        let issuer_ok = self.allowed_issuers.is_empty()
            || self.allowed_issuers.iter().any(|i| i == claims.issuer());
        let audience_ok = self
            .audience
            .as_deref()
            .map_or(true, |aud| aud == claims.audience());
        issuer_ok && audience_ok
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateReceipt {
    pub signature: TxSignature,
    pub address: Address,
    pub bump: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub signature: TxSignature,
    pub source: Address,
    pub destination: Address,
    pub amount: u64,
}

/// Entry state. Holds the collaborators every later state needs.
#[derive(Clone, Copy)]
pub struct TransferAuthorizer<'a> {
    registry: &'a dyn AccountRegistry,
    verifier: &'a dyn ProofVerifier,
    deriver: &'a AddressDeriver,
    policy: &'a ClaimsPolicy,
}

impl<'a> TransferAuthorizer<'a> {
    pub fn new(
        registry: &'a dyn AccountRegistry,
        verifier: &'a dyn ProofVerifier,
        deriver: &'a AddressDeriver,
        policy: &'a ClaimsPolicy,
    ) -> Self {
        Self {
            registry,
            verifier,
            deriver,
            policy,
        }
    }

    /// Verifies the proof and decodes its claims. Malformed outputs, an
    /// unverified token and a policy miss all report `ProofNotVerified`.
    pub fn authenticate(self, proof: &Proof) -> Result<Authenticated<'a>, ZkaaError> {
        if let Err(e) = self.verifier.verify(proof) {
            warn!(error = %e, "proof rejected by verifier");
            return Err(e.into());
        }

        let claims = match Claims::decode(&proof.public_outputs) {
            Ok(claims) => claims,
            Err(e) => {
                warn!(error = %e, "proof outputs could not be decoded");
                return Err(ZkaaError::ProofNotVerified);
            }
        };

        if !claims.verified() {
            warn!("proof outputs are not marked verified");
            return Err(ZkaaError::ProofNotVerified);
        }
        if !self.policy.admits(&claims) {
            warn!(
                issuer = claims.issuer(),
                audience = claims.audience(),
                "claims rejected by policy"
            );
            return Err(ZkaaError::ProofNotVerified);
        }

        Ok(Authenticated { ctx: self, claims })
    }
}

pub struct Authenticated<'a> {
    ctx: TransferAuthorizer<'a>,
    claims: Claims,
}

impl<'a> Authenticated<'a> {
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Binds the session to the account at `(claims.email_hash, salt)`.
    pub fn select_account(self, salt: Salt) -> Result<AccountSelected<'a>, ZkaaError> {
        let (address, bump) = self.ctx.deriver.derive(self.claims.email_hash(), &salt)?;
        Ok(AccountSelected {
            ctx: self.ctx,
            claims: self.claims,
            salt,
            address,
            bump,
        })
    }
}

pub struct AccountSelected<'a> {
    ctx: TransferAuthorizer<'a>,
    claims: Claims,
    salt: Salt,
    address: Address,
    bump: u8,
}

impl<'a> AccountSelected<'a> {
    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn bump(&self) -> u8 {
        self.bump
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Initializes the selected account. `payer` funds the rent reserve.
    pub async fn create_account(
        self,
        email_hash: &EmailHash,
        payer: Address,
        signature: TxSignature,
    ) -> Result<CreateReceipt, ZkaaError> {
        if email_hash != self.claims.email_hash() {
            warn!(address = %self.address, "create rejected: email hash mismatch");
            return Err(ZkaaError::EmailHashMismatch);
        }
        if self.ctx.registry.exists(&self.address).await? {
            return Err(ZkaaError::AccountAlreadyInitialized(self.address));
        }

        let record = UserAccount {
            email_hash: *email_hash,
            salt: self.salt,
            bump: self.bump,
        };
        self.ctx
            .registry
            .create(AccountCreation {
                payer,
                address: self.address,
                record,
                signature,
            })
            .await?;

        info!(address = %self.address, bump = self.bump, payer = %payer, "account created");
        Ok(CreateReceipt {
            signature,
            address: self.address,
            bump: self.bump,
        })
    }

    /// Moves `amount` lamports from the selected account to `destination`.
    pub async fn transfer(
        self,
        email_hash: &EmailHash,
        amount: u64,
        destination: Address,
        signature: TxSignature,
    ) -> Result<TransferReceipt, ZkaaError> {
        if amount == 0 {
            return Err(ZkaaError::InvalidInput(
                "transfer amount must be positive".into(),
            ));
        }
        if destination == self.address {
            return Err(ZkaaError::InvalidInput(
                "destination must differ from source".into(),
            ));
        }
        if !self.claims.verified() {
            return Err(ZkaaError::ProofNotVerified);
        }
        if email_hash != self.claims.email_hash() {
            warn!(address = %self.address, "transfer rejected: email hash mismatch");
            return Err(ZkaaError::EmailHashMismatch);
        }

        let record = self
            .ctx
            .registry
            .account(&self.address)
            .await?
            .ok_or(ZkaaError::AccountNotInitialized(self.address))?;
        if record.email_hash != *email_hash || record.salt != self.salt {
            warn!(address = %self.address, "transfer rejected: record does not match selection");
            return Err(ZkaaError::SaltMismatch);
        }

        let available = self.ctx.registry.available_balance(&self.address).await?;
        if amount > available {
            return Err(ZkaaError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        // The registry re-checks the balance under its own lock, so a
        // concurrent transfer cannot overdraw between the read and the write.
        self.ctx
            .registry
            .transfer(LedgerTransfer {
                source: self.address,
                destination,
                amount,
                signature,
            })
            .await?;

        info!(source = %self.address, destination = %destination, amount, "transfer applied");
        Ok(TransferReceipt {
            signature,
            source: self.address,
            destination,
            amount,
        })
    }
}
