//! Authoritative account storage.
//!
//! Every mutation is a single check-then-mutate step inside the registry, so
//! callers never need to hold a lock across the reads they validated against.

use async_trait::async_trait;
use zkaa_common::{account::available_balance, Address, TxSignature, UserAccount, ZkaaError};

pub mod memory;
pub mod postgres;

pub use memory::MemoryRegistry;
pub use postgres::PgRegistry;

/// Balance and optional program record held at one address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerAccount {
    pub lamports: u64,
    pub data: Option<UserAccount>,
}

impl LedgerAccount {
    /// Removes `amount`, keeping `reserve` behind if the address holds a
    /// record. Plain balances have no reserve.
    pub fn debit(&mut self, amount: u64, reserve: u64) -> Result<(), ZkaaError> {
        let floor = if self.data.is_some() { reserve } else { 0 };
        let available = available_balance(self.lamports, floor);
        if amount > available {
            return Err(ZkaaError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.lamports -= amount;
        Ok(())
    }

    pub fn credit(&mut self, amount: u64) -> Result<(), ZkaaError> {
        self.lamports = self
            .lamports
            .checked_add(amount)
            .ok_or_else(|| ZkaaError::InvalidInput("balance overflow".into()))?;
        Ok(())
    }
}

/// Account creation as applied by the ledger: the payer funds the new
/// record's rent reserve.
#[derive(Debug, Clone)]
pub struct AccountCreation {
    pub payer: Address,
    pub address: Address,
    pub record: UserAccount,
    pub signature: TxSignature,
}

#[derive(Debug, Clone)]
pub struct LedgerTransfer {
    pub source: Address,
    pub destination: Address,
    pub amount: u64,
    pub signature: TxSignature,
}

#[async_trait]
pub trait AccountRegistry: Send + Sync {
    /// Minimum balance every record keeps.
    fn rent_exempt_reserve(&self) -> u64;

    /// True if a record exists at `address`.
    async fn exists(&self, address: &Address) -> Result<bool, ZkaaError>;

    /// Balance in lamports; zero for unknown addresses.
    async fn raw_balance(&self, address: &Address) -> Result<u64, ZkaaError>;

    async fn account(&self, address: &Address) -> Result<Option<UserAccount>, ZkaaError>;

    /// Fails with `AccountAlreadyInitialized` if a record already exists.
    async fn create(&self, creation: AccountCreation) -> Result<(), ZkaaError>;

    /// Debits the source and credits the destination as one step.
    async fn transfer(&self, transfer: LedgerTransfer) -> Result<(), ZkaaError>;

    /// External deposit; returns the new raw balance.
    async fn fund(&self, address: &Address, amount: u64) -> Result<u64, ZkaaError>;

    async fn available_balance(&self, address: &Address) -> Result<u64, ZkaaError> {
        let raw = self.raw_balance(address).await?;
        Ok(available_balance(raw, self.rent_exempt_reserve()))
    }
}
