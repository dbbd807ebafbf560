//! Full-chain integrity verification.
//!
//! `check_database` replays every stored block from genesis through the
//! same validation path used at commit time, rebuilding the UTXO set and
//! comparing it against the persisted mirror. The sweep is cancellable:
//! a caller-owned flag is polled between blocks, and a cancelled sweep
//! reports `Stopped`, which is not a corruption verdict.
//!
//! `reset_corrupt` is the recovery path: it rebuilds a fresh database
//! from the verifiable prefix of a corrupt one, swapping it into place
//! and keeping the original under a `.corrupt` suffix.

mod version;

pub use version::{
    check_db_version, should_verify, VersionError, DB_VERIFY_CHECKPOINT_VERSION,
};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{info, warn};
use thiserror::Error;

use crate::chain::Ledger;
use crate::coin::SignedBlock;
use crate::crypto::PublicKey;
use crate::params::VerifyTxn;
use crate::storage::{ChainDb, StorageError};
use crate::validation::verify_block;

#[derive(Debug, Error)]
pub enum IntegrityError {
    /// The sweep was cancelled before completion. Not a verdict.
    #[error("verification stopped")]
    Stopped,
    #[error("database corrupt at block {seq}: {reason}")]
    Corrupt { seq: u64, reason: String },
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("i/o error during database swap: {0}")]
    Io(#[from] std::io::Error),
}

impl IntegrityError {
    fn corrupt(seq: u64, reason: impl Into<String>) -> Self {
        IntegrityError::Corrupt {
            seq,
            reason: reason.into(),
        }
    }
}

/// Verify a stored genesis block: authority signature, genesis shape,
/// and header-body consistency
fn verify_genesis(signed: &SignedBlock, authority: &PublicKey) -> Result<(), IntegrityError> {
    if !signed.verify_sig(authority) {
        return Err(IntegrityError::corrupt(0, "untrusted genesis signature"));
    }
    if !signed.block.is_genesis() {
        return Err(IntegrityError::corrupt(0, "first block is not a genesis block"));
    }
    if signed.block.head.body_hash != signed.block.body.hash() {
        return Err(IntegrityError::corrupt(0, "genesis body hash mismatch"));
    }
    Ok(())
}

/// Replay the whole chain in `db`, verifying every block, and compare
/// the rebuilt UTXO set against the persisted mirror.
///
/// Returns the rebuilt ledger on success. Polls `quit` between blocks;
/// a raised flag aborts with `Stopped`.
pub fn check_database(
    db: &ChainDb,
    authority: &PublicKey,
    ruleset: &VerifyTxn,
    max_block_transactions_size: u32,
    quit: &AtomicBool,
) -> Result<Ledger, IntegrityError> {
    let head_seq = match db.head_seq()? {
        Some(seq) => seq,
        None => {
            info!("database is empty; nothing to verify");
            return Ok(Ledger::new());
        }
    };

    let mut ledger = Ledger::new();
    for seq in 0..=head_seq {
        if quit.load(Ordering::Relaxed) {
            return Err(IntegrityError::Stopped);
        }

        let signed = db
            .get_block(seq)?
            .ok_or_else(|| IntegrityError::corrupt(seq, "block missing from store"))?;
        if signed.block.head.seq != seq {
            return Err(IntegrityError::corrupt(
                seq,
                format!("stored under sequence {seq} but claims {}", signed.block.head.seq),
            ));
        }

        if seq == 0 {
            verify_genesis(&signed, authority)?;
        } else {
            let head = ledger
                .head()
                .ok_or_else(|| IntegrityError::corrupt(seq, "no head to verify against"))?;
            verify_block(
                &signed,
                head,
                ledger.snapshot(),
                ruleset,
                max_block_transactions_size,
                authority,
            )
            .map_err(|e| IntegrityError::corrupt(seq, e.to_string()))?;
        }

        ledger
            .apply_block(&signed.block)
            .map_err(|e| IntegrityError::corrupt(seq, e.to_string()))?;
    }

    let mirror = db.load_utxos()?;
    if mirror != *ledger.snapshot() {
        return Err(IntegrityError::corrupt(
            head_seq,
            format!(
                "unspent output mirror has {} entries, replay produced {}",
                mirror.len(),
                ledger.snapshot().len()
            ),
        ));
    }

    info!("verified {} blocks, chain is consistent", head_seq + 1);
    Ok(ledger)
}

/// Rebuild a corrupt database from its verifiable prefix.
///
/// Blocks are replayed into a fresh database next to `path` until the
/// first one that fails verification; everything from that block on is
/// discarded. On success the corrupt database is preserved under a
/// `.corrupt` suffix and the rebuilt one takes its place. Returns the
/// reopened database and its rebuilt ledger.
pub fn reset_corrupt(
    path: &Path,
    authority: &PublicKey,
    ruleset: &VerifyTxn,
    max_block_transactions_size: u32,
    quit: &AtomicBool,
) -> Result<(ChainDb, Ledger), IntegrityError> {
    let tmp_path = sibling(path, ".rebuild");
    let corrupt_path = sibling(path, ".corrupt");
    if tmp_path.exists() {
        std::fs::remove_dir_all(&tmp_path)?;
    }

    let rebuilt = {
        let old = ChainDb::open(path)?;
        let fresh = ChainDb::open(&tmp_path)?;
        match rebuild_into(&old, &fresh, authority, ruleset, max_block_transactions_size, quit) {
            Ok(ledger) => {
                if let Some(version) = old.version()? {
                    fresh.set_version(&version)?;
                }
                ledger
            }
            Err(e) => {
                drop(fresh);
                let _ = std::fs::remove_dir_all(&tmp_path);
                return Err(e);
            }
        }
        // Both handles drop here so the directories can be swapped
    };

    if corrupt_path.exists() {
        std::fs::remove_dir_all(&corrupt_path)?;
    }
    std::fs::rename(path, &corrupt_path)?;
    std::fs::rename(&tmp_path, path)?;
    warn!(
        "corrupt database preserved at {}, rebuilt chain at sequence {:?}",
        corrupt_path.display(),
        rebuilt.head_seq()
    );

    let db = ChainDb::open(path)?;
    Ok((db, rebuilt))
}

fn rebuild_into(
    old: &ChainDb,
    fresh: &ChainDb,
    authority: &PublicKey,
    ruleset: &VerifyTxn,
    max_block_transactions_size: u32,
    quit: &AtomicBool,
) -> Result<Ledger, IntegrityError> {
    let head_seq = match old.head_seq()? {
        Some(seq) => seq,
        None => return Ok(Ledger::new()),
    };

    let mut ledger = Ledger::new();
    for seq in 0..=head_seq {
        if quit.load(Ordering::Relaxed) {
            return Err(IntegrityError::Stopped);
        }

        let signed = match old.get_block(seq)? {
            Some(b) if b.block.head.seq == seq => b,
            _ => {
                warn!("discarding blocks from sequence {seq} on");
                break;
            }
        };

        let verdict = if seq == 0 {
            verify_genesis(&signed, authority)
        } else {
            match ledger.head() {
                Some(head) => verify_block(
                    &signed,
                    head,
                    ledger.snapshot(),
                    ruleset,
                    max_block_transactions_size,
                    authority,
                )
                .map_err(|e| IntegrityError::corrupt(seq, e.to_string())),
                None => Err(IntegrityError::corrupt(seq, "no verified prefix")),
            }
        };
        if let Err(e) = verdict {
            warn!("discarding blocks from sequence {seq} on: {e}");
            break;
        }

        let delta = ledger
            .apply_block(&signed.block)
            .map_err(|e| IntegrityError::corrupt(seq, e.to_string()))?;
        fresh.save_block(&signed)?;
        fresh.update_utxos(&delta.spent, &delta.created)?;
    }

    Ok(ledger)
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "chain".into());
    name.push(suffix);
    path.with_file_name(name)
}
