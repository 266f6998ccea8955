use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use zkaa_common::{Address, Rent, TxSignature, UserAccount, ZkaaError};

use super::{AccountCreation, AccountRegistry, LedgerAccount, LedgerTransfer};

/// Ledger backed by Postgres. Each mutation runs in one database transaction
/// holding row locks on both addresses it touches, taken in address order.
/// Faucet deposits are applied as increments.
pub struct PgRegistry {
    pool: PgPool,
    reserve: u64,
}

impl PgRegistry {
    pub fn new(pool: PgPool, rent: Rent) -> Self {
        Self {
            pool,
            reserve: rent.account_reserve(),
        }
    }

    /// Connects and applies the embedded migrations.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        rent: Rent,
    ) -> Result<Self, ZkaaError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(db_err)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| ZkaaError::Ledger(e.to_string()))?;

        Ok(Self::new(pool, rent))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(err: sqlx::Error) -> ZkaaError {
    ZkaaError::Ledger(err.to_string())
}

fn to_db(lamports: u64) -> Result<i64, ZkaaError> {
    i64::try_from(lamports)
        .map_err(|_| ZkaaError::InvalidInput(format!("{lamports} lamports exceeds the ledger range")))
}

fn from_db(lamports: i64) -> u64 {
    // lamports >= 0 is enforced by the table constraint
    u64::try_from(lamports).unwrap_or(0)
}

/// Locks the rows of both addresses, inserting empty rows for unknown
/// addresses first. Rows are always created and locked in address order, so
/// two mutations touching the same pair wait on each other instead of
/// deadlocking.
async fn lock_pair(
    tx: &mut Transaction<'_, Postgres>,
    first: &Address,
    second: &Address,
) -> Result<(LedgerAccount, LedgerAccount), ZkaaError> {
    let mut keys = vec![first.as_bytes().to_vec(), second.as_bytes().to_vec()];
    keys.sort();

    sqlx::query(
        r#"
        INSERT INTO ledger_accounts (address)
        SELECT address FROM UNNEST($1::bytea[]) AS keys(address)
        ORDER BY address
        ON CONFLICT (address) DO NOTHING
        "#,
    )
    .bind(&keys)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    let rows: Vec<(Vec<u8>, i64, Option<Vec<u8>>)> = sqlx::query_as(
        r#"
        SELECT address, lamports, data
        FROM ledger_accounts
        WHERE address = ANY($1)
        ORDER BY address
        FOR UPDATE
        "#,
    )
    .bind(&keys)
    .fetch_all(&mut **tx)
    .await
    .map_err(db_err)?;

    let mut first_account = None;
    let mut second_account = None;
    for (address, lamports, data) in rows {
        let account = LedgerAccount {
            lamports: from_db(lamports),
            data: data.as_deref().map(UserAccount::from_bytes).transpose()?,
        };
        if address.as_slice() == first.as_bytes().as_slice() {
            first_account = Some(account);
        } else if address.as_slice() == second.as_bytes().as_slice() {
            second_account = Some(account);
        }
    }

    match (first_account, second_account) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(ZkaaError::Ledger("locked rows missing after insert".into())),
    }
}

async fn claim_signature(
    tx: &mut Transaction<'_, Postgres>,
    signature: &TxSignature,
    kind: &str,
    source: &Address,
    destination: &Address,
    amount: u64,
) -> Result<(), ZkaaError> {
    let result = sqlx::query(
        r#"
        INSERT INTO ledger_signatures (signature, kind, source, destination, amount)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (signature) DO NOTHING
        "#,
    )
    .bind(signature.0.as_slice())
    .bind(kind)
    .bind(source.as_bytes().as_slice())
    .bind(destination.as_bytes().as_slice())
    .bind(to_db(amount)?)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(ZkaaError::DuplicateSignature);
    }
    Ok(())
}

async fn store(
    tx: &mut Transaction<'_, Postgres>,
    address: &Address,
    account: &LedgerAccount,
) -> Result<(), ZkaaError> {
    sqlx::query(
        r#"
        UPDATE ledger_accounts
        SET lamports = $2,
            data = $3,
            updated_at = NOW()
        WHERE address = $1
        "#,
    )
    .bind(address.as_bytes().as_slice())
    .bind(to_db(account.lamports)?)
    .bind(account.data.as_ref().map(UserAccount::to_bytes))
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl AccountRegistry for PgRegistry {
    fn rent_exempt_reserve(&self) -> u64 {
        self.reserve
    }

    async fn exists(&self, address: &Address) -> Result<bool, ZkaaError> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM ledger_accounts
                WHERE address = $1 AND data IS NOT NULL
            )
            "#,
        )
        .bind(address.as_bytes().as_slice())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn raw_balance(&self, address: &Address) -> Result<u64, ZkaaError> {
        let lamports: Option<i64> =
            sqlx::query_scalar("SELECT lamports FROM ledger_accounts WHERE address = $1")
                .bind(address.as_bytes().as_slice())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(lamports.map(from_db).unwrap_or(0))
    }

    async fn account(&self, address: &Address) -> Result<Option<UserAccount>, ZkaaError> {
        let data: Option<Option<Vec<u8>>> =
            sqlx::query_scalar("SELECT data FROM ledger_accounts WHERE address = $1")
                .bind(address.as_bytes().as_slice())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        data.flatten()
            .as_deref()
            .map(UserAccount::from_bytes)
            .transpose()
    }

    async fn create(&self, creation: AccountCreation) -> Result<(), ZkaaError> {
        if creation.payer == creation.address {
            return Err(ZkaaError::InvalidInput(
                "fee payer cannot be the account being created".into(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        claim_signature(
            &mut tx,
            &creation.signature,
            "create_account",
            &creation.payer,
            &creation.address,
            self.reserve,
        )
        .await?;

        let (mut payer, mut target) =
            lock_pair(&mut tx, &creation.payer, &creation.address).await?;
        if target.data.is_some() {
            return Err(ZkaaError::AccountAlreadyInitialized(creation.address));
        }
        payer.debit(self.reserve, self.reserve)?;
        target.credit(self.reserve)?;
        target.data = Some(creation.record);

        store(&mut tx, &creation.payer, &payer).await?;
        store(&mut tx, &creation.address, &target).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn transfer(&self, transfer: LedgerTransfer) -> Result<(), ZkaaError> {
        if transfer.source == transfer.destination {
            return Err(ZkaaError::InvalidInput(
                "destination must differ from source".into(),
            ));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        claim_signature(
            &mut tx,
            &transfer.signature,
            "transfer",
            &transfer.source,
            &transfer.destination,
            transfer.amount,
        )
        .await?;

        let (mut source, mut destination) =
            lock_pair(&mut tx, &transfer.source, &transfer.destination).await?;
        if source.data.is_none() {
            return Err(ZkaaError::AccountNotInitialized(transfer.source));
        }
        source.debit(transfer.amount, self.reserve)?;
        destination.credit(transfer.amount)?;

        store(&mut tx, &transfer.source, &source).await?;
        store(&mut tx, &transfer.destination, &destination).await?;
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn fund(&self, address: &Address, amount: u64) -> Result<u64, ZkaaError> {
        let lamports: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO ledger_accounts (address, lamports)
            VALUES ($1, $2)
            ON CONFLICT (address) DO UPDATE
            SET lamports = ledger_accounts.lamports + EXCLUDED.lamports,
                updated_at = NOW()
            RETURNING lamports
            "#,
        )
        .bind(address.as_bytes().as_slice())
        .bind(to_db(amount)?)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(from_db(lamports))
    }
}
