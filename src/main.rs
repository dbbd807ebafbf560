//! VELA (VLA) ledger tool
//!
//! `vela checkdb` runs the full-chain integrity sweep against an on-disk
//! database; `vela verify-address` checks an address string offline.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use vela_core::crypto::{Address, PublicKey};
use vela_core::integrity::{check_database, reset_corrupt, IntegrityError};
use vela_core::params::{self, VerifyTxn};
use vela_core::storage::ChainDb;

#[derive(Parser)]
#[command(name = "vela", version, about = "VELA ledger tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify the integrity of a chain database
    Checkdb {
        /// Path to the database directory
        #[arg(default_value = "data/chain")]
        path: PathBuf,
        /// Chain authority public key, hex
        #[arg(long)]
        pubkey: String,
        /// On corruption, rebuild the database from its verifiable prefix
        #[arg(long)]
        reset_corrupt: bool,
    },
    /// Check that an address string is well formed
    VerifyAddress {
        /// The address to check
        address: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Checkdb {
            path,
            pubkey,
            reset_corrupt,
        } => run_checkdb(path, &pubkey, reset_corrupt).await,
        Command::VerifyAddress { address } => run_verify_address(&address),
    }
}

async fn run_checkdb(path: PathBuf, pubkey: &str, reset: bool) -> ExitCode {
    let authority = match PublicKey::from_hex(pubkey) {
        Ok(pk) => pk,
        Err(e) => {
            error!("invalid public key: {e}");
            return ExitCode::FAILURE;
        }
    };
    let ruleset = match VerifyTxn::user_from_env() {
        Ok(r) => r,
        Err(e) => {
            error!("invalid verification parameters: {e}");
            return ExitCode::FAILURE;
        }
    };
    let max_size = params::DEFAULT_MAX_BLOCK_TRANSACTIONS_SIZE;

    // Ctrl-C raises the quit flag; the sweep notices between blocks
    let quit = Arc::new(AtomicBool::new(false));
    {
        let quit = quit.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping verification");
                quit.store(true, Ordering::Relaxed);
            }
        });
    }

    let result = {
        let path = path.clone();
        let quit = quit.clone();
        tokio::task::spawn_blocking(move || {
            let db = ChainDb::open(&path)?;
            check_database(&db, &authority, &ruleset, max_size, &quit).map(|_| ())
        })
        .await
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("verification task failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        Ok(()) => {
            info!("database verified, no problems found");
            ExitCode::SUCCESS
        }
        // A cancelled sweep is not a corruption verdict
        Err(IntegrityError::Stopped) => {
            info!("verification stopped before completion");
            ExitCode::SUCCESS
        }
        Err(e @ IntegrityError::Corrupt { .. }) if reset => {
            warn!("{e}");
            let quit = quit.clone();
            let rebuilt = tokio::task::spawn_blocking(move || {
                reset_corrupt(&path, &authority, &ruleset, max_size, &quit)
            })
            .await;
            match rebuilt {
                Ok(Ok((_, ledger))) => {
                    info!(
                        "database rebuilt, chain restored to sequence {:?}",
                        ledger.head_seq()
                    );
                    ExitCode::SUCCESS
                }
                Ok(Err(IntegrityError::Stopped)) => {
                    info!("rebuild stopped before completion");
                    ExitCode::SUCCESS
                }
                Ok(Err(e)) => {
                    error!("rebuild failed: {e}");
                    ExitCode::FAILURE
                }
                Err(e) => {
                    error!("rebuild task failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_verify_address(address: &str) -> ExitCode {
    match address.parse::<Address>() {
        Ok(addr) => {
            info!("address is valid: {addr}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("invalid address: {e}");
            ExitCode::FAILURE
        }
    }
}
