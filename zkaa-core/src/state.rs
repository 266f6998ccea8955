use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};
use zkaa_common::{api::LedgerEvent, AddressDeriver, Rent, ZkaaError};

use crate::{
    authorizer::{ClaimsPolicy, TransferAuthorizer},
    config::Config,
    registry::{AccountRegistry, MemoryRegistry, PgRegistry},
    verifier::{CommitmentVerifier, ProofVerifier},
};

pub struct AppState {
    pub registry: Arc<dyn AccountRegistry>,
    pub verifier: Arc<dyn ProofVerifier>,
    pub deriver: AddressDeriver,
    pub policy: ClaimsPolicy,
    pub events: broadcast::Sender<LedgerEvent>,
    pub faucet_enabled: bool,
}

impl AppState {
    pub fn new(
        registry: Arc<dyn AccountRegistry>,
        verifier: Arc<dyn ProofVerifier>,
        deriver: AddressDeriver,
        policy: ClaimsPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(1000); // Buffer size of 1000 events
        Self {
            registry,
            verifier,
            deriver,
            policy,
            events,
            faucet_enabled: false,
        }
    }

    pub fn with_faucet(mut self, enabled: bool) -> Self {
        self.faucet_enabled = enabled;
        self
    }

    pub async fn from_config(config: &Config) -> Result<Self, ZkaaError> {
        let rent = Rent::default();
        let registry: Arc<dyn AccountRegistry> = match &config.database_url {
            Some(url) => {
                info!(max_connections = config.max_connections, "using postgres ledger");
                Arc::new(PgRegistry::connect(url, config.max_connections, rent).await?)
            }
            None => {
                warn!("DATABASE_URL not set, ledger state is kept in memory");
                Arc::new(MemoryRegistry::new(rent))
            }
        };
        let verifier = Arc::new(CommitmentVerifier::new(config.vkey_hash));

        Ok(Self::new(
            registry,
            verifier,
            AddressDeriver::new(config.program_id),
            config.policy(),
        )
        .with_faucet(config.enable_faucet))
    }

    pub fn authorizer(&self) -> TransferAuthorizer<'_> {
        TransferAuthorizer::new(
            self.registry.as_ref(),
            self.verifier.as_ref(),
            &self.deriver,
            &self.policy,
        )
    }

    /// Broadcasts to websocket subscribers. Having none is not an error.
    pub fn publish(&self, event: LedgerEvent) {
        let _ = self.events.send(event);
    }
}
