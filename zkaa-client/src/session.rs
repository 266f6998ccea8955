//! Signed-in identity and the accounts it follows.

use std::collections::BTreeSet;

use tracing::{info, warn};
use zkaa_common::{Claims, EmailHash, Proof, Salt, ZkaaError};

use crate::reconciler::{BalanceReconciler, ReconcilerHandle, TrackedAccount};

/// Holds the proof obtained at sign-in. The proof is reused for every
/// operation of the session, and the tracked salts drive the balance
/// reconciler when one is attached.
pub struct Session {
    proof: Proof,
    claims: Claims,
    salts: BTreeSet<Salt>,
    reconciler: Option<ReconcilerHandle>,
}

impl Session {
    /// Accepts a proof only if its outputs decode and are marked verified.
    /// Undecodable outputs are reported as `ProofNotVerified`.
    pub fn sign_in(proof: Proof) -> Result<Self, ZkaaError> {
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

        info!(email_hash = %claims.email_hash(), issuer = claims.issuer(), "signed in");
        Ok(Self {
            proof,
            claims,
            salts: BTreeSet::new(),
            reconciler: None,
        })
    }

    pub fn email_hash(&self) -> &EmailHash {
        self.claims.email_hash()
    }

    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    /// Starts refreshing balances for every tracked salt. Replaces any
    /// reconciler started earlier.
    pub async fn attach(&mut self, reconciler: BalanceReconciler) {
        let accounts: Vec<_> = self.salts.iter().map(|salt| self.account(salt)).collect();
        if let Some(previous) = self.reconciler.replace(reconciler.spawn(accounts)) {
            previous.cancel().await;
        }
    }

    pub fn balances(&self) -> Option<&ReconcilerHandle> {
        self.reconciler.as_ref()
    }

    /// Follows the account under `salt`. Returns the validated salt.
    pub fn track(&mut self, salt: &str) -> Result<Salt, ZkaaError> {
        let salt = Salt::new(salt)?;
        if self.salts.insert(salt.clone()) {
            if let Some(handle) = &self.reconciler {
                handle.track(self.account(&salt));
            }
        }
        Ok(salt)
    }

    pub fn untrack(&mut self, salt: &Salt) {
        if self.salts.remove(salt) {
            if let Some(handle) = &self.reconciler {
                handle.untrack(&self.account(salt));
            }
        }
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Salt> {
        self.salts.iter()
    }

    pub async fn sign_out(self) {
        if let Some(handle) = self.reconciler {
            handle.cancel().await;
        }
        info!(email_hash = %self.claims.email_hash(), "signed out");
    }

    fn account(&self, salt: &Salt) -> TrackedAccount {
        TrackedAccount::new(*self.claims.email_hash(), salt.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ClientError, reconciler::BalanceSource};
    use async_trait::async_trait;
    use std::sync::Arc;
    use zkaa_common::PublicOutputs;

    fn proof(verified: bool) -> Proof {
        let outputs = PublicOutputs {
            email_hash: EmailHash([4u8; 32]),
            subject: "user".into(),
            issuer: "https://accounts.google.com".into(),
            audience: "zkaa".into(),
            verified,
        };
        Proof::new(vec![1u8; 32], outputs.encode())
    }

    struct FixedSource;

    #[async_trait]
    impl BalanceSource for FixedSource {
        async fn available_balance(&self, _: &EmailHash, salt: &Salt) -> Result<u64, ClientError> {
            Ok(salt.len() as u64)
        }
    }

    #[test]
    fn test_sign_in() {
        let session = Session::sign_in(proof(true)).unwrap();
        assert_eq!(session.email_hash(), &EmailHash([4u8; 32]));
        assert_eq!(session.claims().issuer(), "https://accounts.google.com");
    }

    #[test]
    fn test_sign_in_requires_verified_claims() {
        assert!(matches!(
            Session::sign_in(proof(false)),
            Err(ZkaaError::ProofNotVerified)
        ));
    }

    #[test]
    fn test_sign_in_rejects_malformed_outputs() {
        let truncated = Session::sign_in(Proof::new(vec![1], vec![0, 0, 0]));
        assert!(matches!(truncated, Err(ZkaaError::ProofNotVerified)));

        let mut cut = proof(true).public_outputs;
        cut.truncate(40);
        let result = Session::sign_in(Proof::new(vec![1], cut));
        assert!(matches!(result, Err(ZkaaError::ProofNotVerified)));
    }

    #[test]
    fn test_track_validates_salt() {
        let mut session = Session::sign_in(proof(true)).unwrap();
        assert!(session.track("default").is_ok());
        assert!(session.track("default").is_ok());
        assert!(matches!(
            session.track(&"x".repeat(33)),
            Err(ZkaaError::SaltTooLong(33))
        ));
        assert_eq!(session.tracked().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracking_feeds_reconciler() {
        let mut session = Session::sign_in(proof(true)).unwrap();
        let default = session.track("default").unwrap();
        session
            .attach(BalanceReconciler::new(Arc::new(FixedSource)))
            .await;

        let savings = session.track("savings").unwrap();
        session.untrack(&default);

        let handle = session.balances().unwrap();
        let tracked = handle.tracked();
        assert_eq!(tracked.len(), 1);
        assert!(tracked.contains(&TrackedAccount::new(EmailHash([4u8; 32]), savings.clone())));

        let expected = TrackedAccount::new(EmailHash([4u8; 32]), savings);
        let mut updates = handle.subscribe();
        updates
            .wait_for(|cache| cache.get(&expected) == Some(&7))
            .await
            .unwrap();
        assert_eq!(handle.snapshot().len(), 1);

        session.sign_out().await;
    }
}
