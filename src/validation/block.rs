//! Candidate block validation.
//!
//! A block received from the network is checked against the ledger
//! state as of the current head: publisher signature, chain linkage,
//! recomputed hashes, size cap, then every transaction re-verified
//! against an incrementally updated snapshot so that intra-block double
//! spends are caught and earlier in-block outputs are spendable later
//! in the same block.

use std::collections::HashSet;

use thiserror::Error;

use crate::coin::{create_outputs, BlockHeader, SignedBlock};
use crate::crypto::{Hash, PublicKey};
use crate::params::VerifyTxn;
use crate::storage::UtxoSet;
use crate::validation::transaction::{transaction_fee, verify_transaction, TransactionError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    #[error("block signature does not verify against the chain authority key")]
    Untrusted,
    #[error("block sequence {seq} does not extend head sequence {head_seq}")]
    ChainBroken { head_seq: u64, seq: u64 },
    #[error("block body or header hash mismatch")]
    HashMismatch,
    #[error("block timestamp {time} not after previous block time {prev_time}")]
    InvalidTimestamp { prev_time: u64, time: u64 },
    #[error("block has no transactions")]
    Empty,
    #[error("block transactions size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: u32 },
    #[error("block fee {stated} does not match computed fee {computed}")]
    InvalidFee { stated: u64, computed: u64 },
    #[error("output {0} spent twice within one block")]
    IntraBlockDoubleSpend(Hash),
    #[error("transaction {txn} invalid: {source}")]
    Transaction {
        txn: Hash,
        #[source]
        source: TransactionError,
    },
}

/// Verify a signed candidate block against the current head and the UTXO
/// snapshot as of that head
pub fn verify_block(
    signed: &SignedBlock,
    head: &BlockHeader,
    utxos: &UtxoSet,
    ruleset: &VerifyTxn,
    max_block_transactions_size: u32,
    authority: &PublicKey,
) -> Result<(), BlockError> {
    if !signed.verify_sig(authority) {
        return Err(BlockError::Untrusted);
    }

    let block = &signed.block;

    if block.head.seq != head.seq + 1 || block.head.prev_hash != head.hash() {
        return Err(BlockError::ChainBroken {
            head_seq: head.seq,
            seq: block.head.seq,
        });
    }

    if block.head.time <= head.time {
        return Err(BlockError::InvalidTimestamp {
            prev_time: head.time,
            time: block.head.time,
        });
    }

    if block.head.body_hash != block.body.hash() {
        return Err(BlockError::HashMismatch);
    }

    if block.body.transactions.is_empty() {
        return Err(BlockError::Empty);
    }

    let size = block.body.size();
    if size > max_block_transactions_size as usize {
        return Err(BlockError::TooLarge {
            size,
            max: max_block_transactions_size,
        });
    }

    // Re-apply incrementally: each transaction is verified against the
    // snapshot as mutated by its predecessors in this block.
    let mut snapshot = utxos.clone();
    let mut spent_in_block: HashSet<Hash> = HashSet::new();
    let mut total_fee: u64 = 0;

    for txn in &block.body.transactions {
        for input in &txn.inputs {
            if spent_in_block.contains(input) {
                return Err(BlockError::IntraBlockDoubleSpend(*input));
            }
        }

        verify_transaction(txn, &snapshot, ruleset, block.head.time).map_err(|source| {
            BlockError::Transaction {
                txn: txn.hash(),
                source,
            }
        })?;

        let fee =
            transaction_fee(txn, &snapshot, block.head.time).map_err(|source| {
                BlockError::Transaction {
                    txn: txn.hash(),
                    source,
                }
            })?;
        total_fee = total_fee.saturating_add(fee);

        for input in &txn.inputs {
            snapshot.remove(input);
            spent_in_block.insert(*input);
        }
        for ux in create_outputs(txn, block.head.time, block.head.seq) {
            snapshot.add(ux);
        }
    }

    if block.head.fee != total_fee {
        return Err(BlockError::InvalidFee {
            stated: block.head.fee,
            computed: total_fee,
        });
    }

    Ok(())
}
