mod util;

use std::sync::Arc;
use zkaa_common::{Address, AddressDeriver, Rent};

use crate::{
    authorizer::ClaimsPolicy, registry::MemoryRegistry, state::AppState,
    verifier::CommitmentVerifier,
};

pub const TEST_VKEY_HASH: [u8; 32] = [0x42; 32];
pub const TEST_PROGRAM_ID: Address = Address([0x5a; 32]);

pub fn setup_test_state() -> Arc<AppState> {
    let state = AppState::new(
        Arc::new(MemoryRegistry::new(Rent::default())),
        Arc::new(CommitmentVerifier::new(TEST_VKEY_HASH)),
        AddressDeriver::new(TEST_PROGRAM_ID),
        ClaimsPolicy::default(),
    )
    .with_faucet(true);
    Arc::new(state)
}
