use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zkaa_core::{router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    let state = Arc::new(AppState::from_config(&config).await?);
    tracing::info!(
        program_id = %state.deriver.program_id(),
        faucet = state.faucet_enabled,
        "ledger state ready"
    );

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    tracing::info!("listening on {}", config.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
