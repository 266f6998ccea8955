use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sha2::{Digest, Sha256};
use tracing_subscriber::EnvFilter;
use zkaa_client::{
    validation::parse_units, BalanceReconciler, JwtParts, LedgerClient, ProofServerClient,
    Session, WalletSigner,
};
use zkaa_common::{lamports_to_units, Address, EmailHash, Proof, DEFAULT_PROGRAM_ID};

#[derive(Parser, Debug)]
#[command(name = "zkaa", about = "Proof-gated ledger accounts")]
struct Cli {
    /// Ledger API base URL
    #[arg(long, env = "ZKAA_LEDGER_URL", default_value = "http://127.0.0.1:3000", global = true)]
    ledger_url: String,

    /// Program id used to derive account addresses
    #[arg(long, env = "ZKAA_PROGRAM_ID", default_value = DEFAULT_PROGRAM_ID, global = true)]
    program_id: Address,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct Identity {
    /// Hex email hash as committed by the prover
    #[arg(long, conflicts_with = "email")]
    email_hash: Option<EmailHash>,

    /// Plain email address, hashed with SHA-256
    #[arg(long)]
    email: Option<String>,

    #[arg(long, default_value = "")]
    salt: String,
}

impl Identity {
    fn email_hash(&self) -> Result<EmailHash> {
        match (&self.email_hash, &self.email) {
            (Some(hash), _) => Ok(*hash),
            (None, Some(email)) => Ok(EmailHash(Sha256::digest(email.trim().as_bytes()).into())),
            (None, None) => bail!("either --email-hash or --email is required"),
        }
    }
}

#[derive(Args, Debug)]
struct Relayer {
    /// Hex ed25519 secret of the fee payer
    #[arg(long, env = "ZKAA_RELAYER_KEY", hide_env_values = true)]
    relayer_key: String,
}

impl Relayer {
    fn signer(&self) -> Result<WalletSigner> {
        Ok(WalletSigner::from_hex(&self.relayer_key)?)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fee payer key
    Keygen,
    /// Derive an account address locally
    Address {
        #[command(flatten)]
        identity: Identity,
    },
    /// Print the claims carried by a proof file
    Decode {
        #[arg(long)]
        proof: PathBuf,
    },
    /// Prove a JWT with the proof server and write the proof to a file
    Prove {
        #[arg(long, env = "ZKAA_PROVER_URL", default_value = "http://127.0.0.1:8080")]
        prover_url: String,
        /// Compact JWT
        #[arg(long)]
        jwt: String,
        /// JSON file holding the issuer's signing key (JWK)
        #[arg(long)]
        jwk: PathBuf,
        #[arg(long, default_value = "proof.json")]
        out: PathBuf,
    },
    /// Create the account for an identity and salt
    Create {
        #[command(flatten)]
        identity: Identity,
        #[command(flatten)]
        relayer: Relayer,
        #[arg(long)]
        proof: PathBuf,
    },
    /// Transfer from an account to any address
    Transfer {
        #[command(flatten)]
        identity: Identity,
        #[command(flatten)]
        relayer: Relayer,
        #[arg(long)]
        proof: PathBuf,
        /// Amount in units, e.g. 0.5
        #[arg(long)]
        amount: String,
        #[arg(long)]
        to: Address,
    },
    Balance {
        #[command(flatten)]
        identity: Identity,
    },
    Exists {
        #[command(flatten)]
        identity: Identity,
    },
    /// Print the stored account record
    Account {
        #[command(flatten)]
        identity: Identity,
    },
    /// Deposit through the ledger faucet
    Fund {
        #[arg(long)]
        address: Address,
        #[arg(long)]
        amount: String,
    },
    /// Follow available balances of several salts until interrupted
    Watch {
        #[arg(long)]
        proof: PathBuf,
        #[arg(long = "salt", required = true)]
        salts: Vec<String>,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

fn read_proof(path: &PathBuf) -> Result<Proof> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read proof from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a proof file", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ledger = LedgerClient::new(&cli.ledger_url, cli.program_id)?;

    match cli.command {
        Command::Keygen => {
            let signer = WalletSigner::generate();
            println!("address: {}", signer.address());
            println!("secret:  {}", signer.secret_hex());
        }
        Command::Address { identity } => {
            let (address, bump) = ledger.address(&identity.email_hash()?, &identity.salt)?;
            println!("{address} (bump {bump})");
        }
        Command::Decode { proof } => {
            let session = Session::sign_in(read_proof(&proof)?);
            match session {
                Ok(session) => print_json(session.claims())?,
                Err(e) => bail!("proof rejected: {e}"),
            }
        }
        Command::Prove {
            prover_url,
            jwt,
            jwk,
            out,
        } => {
            let jwt = JwtParts::parse(&jwt)?;
            let key: serde_json::Value = serde_json::from_str(
                &std::fs::read_to_string(&jwk)
                    .with_context(|| format!("failed to read {}", jwk.display()))?,
            )?;
            let output = ProofServerClient::new(&prover_url)?.prove(&jwt, &key).await?;
            std::fs::write(&out, serde_json::to_string_pretty(&output.proof)?)?;
            println!(
                "wrote {} ({} byte proof, vkey {})",
                out.display(),
                output.proof_size,
                output.verification_key
            );
        }
        Command::Create {
            identity,
            relayer,
            proof,
        } => {
            let created = ledger
                .create_account(
                    &identity.email_hash()?,
                    &identity.salt,
                    &read_proof(&proof)?,
                    &relayer.signer()?,
                )
                .await?;
            print_json(&created)?;
        }
        Command::Transfer {
            identity,
            relayer,
            proof,
            amount,
            to,
        } => {
            let receipt = ledger
                .transfer(
                    &identity.email_hash()?,
                    &identity.salt,
                    &read_proof(&proof)?,
                    parse_units(&amount)?,
                    &to,
                    &relayer.signer()?,
                )
                .await?;
            print_json(&receipt)?;
        }
        Command::Balance { identity } => {
            print_json(&ledger.balance(&identity.email_hash()?, &identity.salt).await?)?;
        }
        Command::Exists { identity } => {
            println!("{}", ledger.exists(&identity.email_hash()?, &identity.salt).await?);
        }
        Command::Account { identity } => {
            match ledger.account(&identity.email_hash()?, &identity.salt).await? {
                Some(record) => print_json(&record)?,
                None => bail!("account is not initialized"),
            }
        }
        Command::Fund { address, amount } => {
            print_json(&ledger.fund(&address, parse_units(&amount)?).await?)?;
        }
        Command::Watch {
            proof,
            salts,
            interval_secs,
        } => watch(ledger, read_proof(&proof)?, salts, interval_secs).await?,
    }

    Ok(())
}

async fn watch(ledger: LedgerClient, proof: Proof, salts: Vec<String>, interval_secs: u64) -> Result<()> {
    let mut session = Session::sign_in(proof)?;
    for salt in &salts {
        session.track(salt)?;
    }
    session
        .attach(
            BalanceReconciler::new(Arc::new(ledger))
                .with_interval(Duration::from_secs(interval_secs.max(1))),
        )
        .await;

    let Some(handle) = session.balances() else {
        bail!("balance reconciler did not start");
    };
    let mut updates = handle.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                for salt in session.tracked() {
                    let balance = snapshot
                        .iter()
                        .find(|(account, _)| &account.salt == salt)
                        .map(|(_, lamports)| format!("{:.9}", lamports_to_units(*lamports)))
                        .unwrap_or_else(|| "-".into());
                    println!("{salt:>32}  {balance}");
                }
                println!();
            }
        }
    }

    session.sign_out().await;
    Ok(())
}
