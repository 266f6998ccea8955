//! Runs against a live database: `DATABASE_URL=... cargo test -- --ignored`

use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use zkaa_common::{Address, EmailHash, Rent, Salt, TxSignature, UserAccount, ZkaaError};
use zkaa_core::{
    registry::{AccountCreation, LedgerTransfer},
    AccountRegistry, PgRegistry,
};

async fn setup_registry() -> PgRegistry {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/zkaa_test".to_string());
    PgRegistry::connect(&database_url, 5, Rent::default())
        .await
        .expect("Failed to connect to database")
}

fn random_address() -> Address {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    Address(bytes)
}

fn random_signature() -> TxSignature {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    TxSignature(bytes)
}

fn record() -> UserAccount {
    UserAccount {
        email_hash: EmailHash([1u8; 32]),
        salt: Salt::new("default").unwrap(),
        bump: 254,
    }
}

async fn open(registry: &PgRegistry) -> Address {
    let payer = random_address();
    let address = random_address();
    registry.fund(&payer, 1_000_000_000).await.unwrap();
    registry
        .create(AccountCreation {
            payer,
            address,
            record: record(),
            signature: random_signature(),
        })
        .await
        .unwrap();
    address
}

#[tokio::test]
#[ignore]
async fn test_create_and_read() {
    let registry = setup_registry().await;
    let address = open(&registry).await;

    assert!(registry.exists(&address).await.unwrap());
    assert_eq!(registry.account(&address).await.unwrap(), Some(record()));
    assert_eq!(
        registry.raw_balance(&address).await.unwrap(),
        registry.rent_exempt_reserve()
    );
    assert_eq!(registry.available_balance(&address).await.unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn test_create_twice() {
    let registry = setup_registry().await;
    let address = open(&registry).await;
    let payer = random_address();
    registry.fund(&payer, 1_000_000_000).await.unwrap();

    let result = registry
        .create(AccountCreation {
            payer,
            address,
            record: record(),
            signature: random_signature(),
        })
        .await;
    assert_eq!(result, Err(ZkaaError::AccountAlreadyInitialized(address)));
    assert_eq!(registry.raw_balance(&payer).await.unwrap(), 1_000_000_000);
}

#[tokio::test]
#[ignore]
async fn test_transfer_and_replay() {
    let registry = setup_registry().await;
    let source = open(&registry).await;
    let destination = random_address();
    registry.fund(&source, 1_000).await.unwrap();

    let transfer = LedgerTransfer {
        source,
        destination,
        amount: 600,
        signature: random_signature(),
    };
    registry.transfer(transfer.clone()).await.unwrap();
    assert_eq!(registry.raw_balance(&destination).await.unwrap(), 600);

    let replay = registry.transfer(transfer).await;
    assert_eq!(replay, Err(ZkaaError::DuplicateSignature));

    let overdraw = registry
        .transfer(LedgerTransfer {
            source,
            destination,
            amount: 600,
            signature: random_signature(),
        })
        .await;
    assert_eq!(
        overdraw,
        Err(ZkaaError::InsufficientBalance {
            required: 600,
            available: 400
        })
    );
    assert_eq!(registry.available_balance(&source).await.unwrap(), 400);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_transfers() {
    let registry = Arc::new(setup_registry().await);
    let source = open(&registry).await;
    registry.fund(&source, 1_000).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .transfer(LedgerTransfer {
                    source,
                    destination: random_address(),
                    amount: 200,
                    signature: random_signature(),
                })
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }
    assert_eq!(succeeded, 5);
    assert_eq!(registry.available_balance(&source).await.unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn test_opposite_transfers_serialize() {
    let registry = Arc::new(setup_registry().await);
    let first = open(&registry).await;
    let second = open(&registry).await;
    registry.fund(&first, 1_000).await.unwrap();
    registry.fund(&second, 1_000).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..20 {
        let registry = registry.clone();
        let (source, destination) = if i % 2 == 0 {
            (first, second)
        } else {
            (second, first)
        };
        handles.push(tokio::spawn(async move {
            registry
                .transfer(LedgerTransfer {
                    source,
                    destination,
                    amount: 10,
                    signature: random_signature(),
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), Ok(()));
    }
    assert_eq!(registry.available_balance(&first).await.unwrap(), 1_000);
    assert_eq!(registry.available_balance(&second).await.unwrap(), 1_000);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_creates_leave_one_record() {
    let registry = Arc::new(setup_registry().await);
    let payer = random_address();
    let address = random_address();
    registry.fund(&payer, 1_000_000_000).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .create(AccountCreation {
                    payer,
                    address,
                    record: record(),
                    signature: random_signature(),
                })
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => created += 1,
            Err(e) => assert_eq!(e, ZkaaError::AccountAlreadyInitialized(address)),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(
        registry.raw_balance(&payer).await.unwrap(),
        1_000_000_000 - registry.rent_exempt_reserve()
    );
    assert_eq!(
        registry.raw_balance(&address).await.unwrap(),
        registry.rent_exempt_reserve()
    );
}
