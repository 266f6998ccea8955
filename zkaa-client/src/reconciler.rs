//! Background refresh of displayed balances.
//!
//! The ledger is authoritative; the reconciler only keeps an eventually
//! consistent cache of available balances for the accounts a session tracks.
//! Each tick snapshots the tracked set, polls every account concurrently and
//! merges the results. A failed read keeps the previous value for that
//! account and is retried on the next tick.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use futures::future::join_all;
use tokio::{
    sync::{oneshot, watch},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};
use zkaa_common::{EmailHash, Salt};

use crate::{error::ClientError, ledger::LedgerClient};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackedAccount {
    pub email_hash: EmailHash,
    pub salt: Salt,
}

impl TrackedAccount {
    pub fn new(email_hash: EmailHash, salt: Salt) -> Self {
        Self { email_hash, salt }
    }
}

pub type BalanceCache = HashMap<TrackedAccount, u64>;

#[async_trait]
pub trait BalanceSource: Send + Sync {
    async fn available_balance(&self, email_hash: &EmailHash, salt: &Salt) -> Result<u64, ClientError>;
}

#[async_trait]
impl BalanceSource for LedgerClient {
    async fn available_balance(&self, email_hash: &EmailHash, salt: &Salt) -> Result<u64, ClientError> {
        let balance = self.balance(email_hash, salt.as_str()).await?;
        Ok(balance.available_lamports)
    }
}

pub struct BalanceReconciler {
    source: Arc<dyn BalanceSource>,
    interval: Duration,
}

impl BalanceReconciler {
    pub fn new(source: Arc<dyn BalanceSource>) -> Self {
        Self {
            source,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Starts polling. The first poll runs immediately.
    pub fn spawn(self, tracked: impl IntoIterator<Item = TrackedAccount>) -> ReconcilerHandle {
        let (tracked_tx, tracked_rx) = watch::channel(tracked.into_iter().collect());
        let (balances_tx, balances_rx) = watch::channel(BalanceCache::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run(
            self.source,
            self.interval,
            tracked_rx,
            balances_tx,
            shutdown_rx,
        ));

        ReconcilerHandle {
            tracked: tracked_tx,
            balances: balances_rx,
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// Owner side of a running reconciler. Dropping it also stops the loop.
pub struct ReconcilerHandle {
    tracked: watch::Sender<BTreeSet<TrackedAccount>>,
    balances: watch::Receiver<BalanceCache>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Adds an account; it is polled from the next tick.
    pub fn track(&self, account: TrackedAccount) {
        self.tracked.send_modify(|set| {
            set.insert(account);
        });
    }

    /// Removes an account; its cached value is pruned on the next merge.
    pub fn untrack(&self, account: &TrackedAccount) {
        self.tracked.send_modify(|set| {
            set.remove(account);
        });
    }

    pub fn tracked(&self) -> BTreeSet<TrackedAccount> {
        self.tracked.borrow().clone()
    }

    pub fn balance(&self, account: &TrackedAccount) -> Option<u64> {
        self.balances.borrow().get(account).copied()
    }

    pub fn snapshot(&self) -> BalanceCache {
        self.balances.borrow().clone()
    }

    /// Receiver notified after every merge.
    pub fn subscribe(&self) -> watch::Receiver<BalanceCache> {
        self.balances.clone()
    }

    /// Stops the loop and waits for it to exit. An in-flight poll is
    /// abandoned.
    pub async fn cancel(self) {
        let _ = self.shutdown.send(());
        let _ = self.task.await;
    }
}

async fn run(
    source: Arc<dyn BalanceSource>,
    interval: Duration,
    tracked: watch::Receiver<BTreeSet<TrackedAccount>>,
    balances: watch::Sender<BalanceCache>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let snapshot = tracked.borrow().clone();
        tokio::select! {
            _ = &mut shutdown => break,
            results = poll(source.as_ref(), &snapshot) => {
                let current = tracked.borrow().clone();
                merge(&balances, &current, results);
            }
        }
    }

    debug!("balance reconciler stopped");
}

async fn poll(
    source: &dyn BalanceSource,
    tracked: &BTreeSet<TrackedAccount>,
) -> Vec<(TrackedAccount, Result<u64, ClientError>)> {
    join_all(tracked.iter().map(|account| async move {
        let result = source
            .available_balance(&account.email_hash, &account.salt)
            .await;
        (account.clone(), result)
    }))
    .await
}

fn merge(
    balances: &watch::Sender<BalanceCache>,
    tracked: &BTreeSet<TrackedAccount>,
    results: Vec<(TrackedAccount, Result<u64, ClientError>)>,
) {
    balances.send_modify(|cache| {
        cache.retain(|account, _| tracked.contains(account));
        for (account, result) in results {
            match result {
                Ok(available) if tracked.contains(&account) => {
                    cache.insert(account, available);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(salt = %account.salt, error = %e, "balance refresh failed, keeping cached value");
                }
            }
        }
    });
}
