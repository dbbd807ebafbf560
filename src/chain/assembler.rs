//! Deterministic block assembly.
//!
//! Given a pool of candidate transactions, selection is a pure function
//! of the pool and the current UTXO snapshot: candidates are ordered by
//! fee per byte, highest first, ties broken by ascending transaction
//! hash, then taken greedily until the next one would push the body past
//! the size cap. Two nodes with the same pool and snapshot assemble the
//! same block.

use log::debug;
use thiserror::Error;

use crate::coin::{create_outputs, Block, BlockHeader, Transaction};
use crate::params::VerifyTxn;
use crate::storage::UtxoSet;
use crate::validation::{transaction_fee, verify_transaction};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("no valid transactions to include")]
    NoTransactions,
    #[error("block time {time} does not advance past head time {head_time}")]
    InvalidTimestamp { head_time: u64, time: u64 },
}

/// Order candidates by fee per byte, highest first, ascending hash on ties
fn sort_candidates(pool: &mut [(Transaction, u64)]) {
    pool.sort_by(|(a, fee_a), (b, fee_b)| {
        let a_rate = *fee_a as u128 * b.size() as u128;
        let b_rate = *fee_b as u128 * a.size() as u128;
        b_rate.cmp(&a_rate).then_with(|| a.hash().cmp(&b.hash()))
    });
}

/// Select transactions from `pool` for the next block.
///
/// Invalid candidates are dropped, including those that become invalid
/// because an earlier selection consumed their inputs. Returns the
/// selections in inclusion order together with the total fee.
pub fn select_transactions(
    pool: &[Transaction],
    utxos: &UtxoSet,
    ruleset: &VerifyTxn,
    max_block_transactions_size: u32,
    now: u64,
) -> (Vec<Transaction>, u64) {
    let mut candidates: Vec<(Transaction, u64)> = pool
        .iter()
        .filter_map(|txn| {
            if verify_transaction(txn, utxos, ruleset, now).is_err() {
                debug!("excluding invalid candidate {}", txn.hash());
                return None;
            }
            let fee = transaction_fee(txn, utxos, now).ok()?;
            Some((txn.clone(), fee))
        })
        .collect();
    sort_candidates(&mut candidates);

    let mut snapshot = utxos.clone();
    let mut selected = Vec::new();
    let mut total_fee: u64 = 0;
    let mut body_size: usize = 0;

    for (txn, fee) in candidates {
        if body_size + txn.size() > max_block_transactions_size as usize {
            break;
        }
        // Re-verify against the evolving snapshot; earlier selections may
        // have consumed this candidate's inputs
        if verify_transaction(&txn, &snapshot, ruleset, now).is_err() {
            continue;
        }
        for input in &txn.inputs {
            snapshot.remove(input);
        }
        for ux in create_outputs(&txn, now, 0) {
            snapshot.add(ux);
        }
        body_size += txn.size();
        total_fee = total_fee.saturating_add(fee);
        selected.push(txn);
    }

    (selected, total_fee)
}

/// Assemble the next block from `pool` on top of `head`
pub fn assemble_block(
    head: &BlockHeader,
    utxos: &UtxoSet,
    pool: &[Transaction],
    ruleset: &VerifyTxn,
    max_block_transactions_size: u32,
    time: u64,
) -> Result<Block, AssembleError> {
    if time <= head.time {
        return Err(AssembleError::InvalidTimestamp {
            head_time: head.time,
            time,
        });
    }

    let (selected, fee) =
        select_transactions(pool, utxos, ruleset, max_block_transactions_size, time);
    if selected.is_empty() {
        return Err(AssembleError::NoTransactions);
    }

    debug!(
        "assembled block seq {} with {} transactions, fee {}",
        head.seq + 1,
        selected.len(),
        fee
    );
    Ok(Block::new(head, time, fee, selected))
}
