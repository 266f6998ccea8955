use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use zkaa_common::{Address, Rent, TxSignature, UserAccount, ZkaaError};

use super::{AccountCreation, AccountRegistry, LedgerAccount, LedgerTransfer};

#[derive(Default)]
struct Ledger {
    accounts: HashMap<Address, LedgerAccount>,
    signatures: HashSet<TxSignature>,
}

/// In-process ledger. One mutex guards the whole map, so every mutation
/// checks and writes under the same lock.
pub struct MemoryRegistry {
    reserve: u64,
    ledger: Mutex<Ledger>,
}

impl MemoryRegistry {
    pub fn new(rent: Rent) -> Self {
        Self {
            reserve: rent.account_reserve(),
            ledger: Mutex::new(Ledger::default()),
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new(Rent::default())
    }
}

#[async_trait]
impl AccountRegistry for MemoryRegistry {
    fn rent_exempt_reserve(&self) -> u64 {
        self.reserve
    }

    async fn exists(&self, address: &Address) -> Result<bool, ZkaaError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .accounts
            .get(address)
            .is_some_and(|account| account.data.is_some()))
    }

    async fn raw_balance(&self, address: &Address) -> Result<u64, ZkaaError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .accounts
            .get(address)
            .map(|account| account.lamports)
            .unwrap_or(0))
    }

    async fn account(&self, address: &Address) -> Result<Option<UserAccount>, ZkaaError> {
        let ledger = self.ledger.lock().await;
        Ok(ledger
            .accounts
            .get(address)
            .and_then(|account| account.data.clone()))
    }

    async fn create(&self, creation: AccountCreation) -> Result<(), ZkaaError> {
        if creation.payer == creation.address {
            return Err(ZkaaError::InvalidInput(
                "fee payer cannot be the account being created".into(),
            ));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger.signatures.contains(&creation.signature) {
            return Err(ZkaaError::DuplicateSignature);
        }

        let mut target = ledger
            .accounts
            .get(&creation.address)
            .cloned()
            .unwrap_or_default();
        if target.data.is_some() {
            return Err(ZkaaError::AccountAlreadyInitialized(creation.address));
        }
        let mut payer = ledger
            .accounts
            .get(&creation.payer)
            .cloned()
            .unwrap_or_default();

        payer.debit(self.reserve, self.reserve)?;
        target.credit(self.reserve)?;
        target.data = Some(creation.record);

        ledger.accounts.insert(creation.payer, payer);
        ledger.accounts.insert(creation.address, target);
        ledger.signatures.insert(creation.signature);
        Ok(())
    }

    async fn transfer(&self, transfer: LedgerTransfer) -> Result<(), ZkaaError> {
        if transfer.source == transfer.destination {
            return Err(ZkaaError::InvalidInput(
                "destination must differ from source".into(),
            ));
        }

        let mut ledger = self.ledger.lock().await;
        if ledger.signatures.contains(&transfer.signature) {
            return Err(ZkaaError::DuplicateSignature);
        }

        let mut source = match ledger.accounts.get(&transfer.source) {
            Some(account) if account.data.is_some() => account.clone(),
            _ => return Err(ZkaaError::AccountNotInitialized(transfer.source)),
        };
        let mut destination = ledger
            .accounts
            .get(&transfer.destination)
            .cloned()
            .unwrap_or_default();

        // Both steps run on copies; nothing is written unless both succeed.
        source.debit(transfer.amount, self.reserve)?;
        destination.credit(transfer.amount)?;

        ledger.accounts.insert(transfer.source, source);
        ledger.accounts.insert(transfer.destination, destination);
        ledger.signatures.insert(transfer.signature);
        Ok(())
    }

    async fn fund(&self, address: &Address, amount: u64) -> Result<u64, ZkaaError> {
        let mut ledger = self.ledger.lock().await;
        let account = ledger.accounts.entry(*address).or_default();
        account.credit(amount)?;
        Ok(account.lamports)
    }
}
