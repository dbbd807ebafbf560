//! Single-transaction verification.
//!
//! `verify_transaction` is a pure function of the transaction, a UTXO
//! snapshot, a ruleset and a timestamp. Checks run in a fixed order and
//! the first failure wins; a transaction that passes is valid against
//! that snapshot and ruleset, nothing else.

use std::collections::HashSet;

use thiserror::Error;

use crate::coin::droplet::{self, DropletError};
use crate::coin::Transaction;
use crate::crypto::{Address, Hash};
use crate::params::{required_fee, VerifyTxn};
use crate::storage::UtxoSet;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction has no inputs")]
    NoInputs,
    #[error("transaction has no outputs")]
    NoOutputs,
    #[error("signature count does not match input count")]
    SignatureCountMismatch,
    #[error("duplicate input {0}")]
    DuplicateInput(Hash),
    #[error("transaction output has zero coins")]
    ZeroCoinOutput,
    #[error("transaction size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: u32 },
    #[error("unknown input {0}")]
    UnknownInput(Hash),
    #[error("invalid signature for input {0}")]
    InvalidSignature(Hash),
    #[error("output coins do not equal input coins")]
    CoinConservation,
    #[error("output amount violates maximum droplet precision {0}")]
    InvalidPrecision(u8),
    #[error("coin arithmetic overflow")]
    Overflow,
    #[error("coin hour arithmetic overflow")]
    HoursOverflow,
    #[error("output coin hours exceed available input coin hours")]
    InsufficientCoinHours,
    #[error("burned {burned} coin hours but at least {required} required")]
    InsufficientCoinHourBurn { burned: u64, required: u64 },
}

/// Verify `txn` against a UTXO snapshot under `ruleset`, with coin hours
/// accrued up to `now`.
pub fn verify_transaction(
    txn: &Transaction,
    utxos: &UtxoSet,
    ruleset: &VerifyTxn,
    now: u64,
) -> Result<(), TransactionError> {
    // 1. Structural
    if txn.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if txn.outputs.is_empty() {
        return Err(TransactionError::NoOutputs);
    }
    if txn.sigs.len() != txn.inputs.len() {
        return Err(TransactionError::SignatureCountMismatch);
    }

    let mut seen = HashSet::with_capacity(txn.inputs.len());
    for input in &txn.inputs {
        if !seen.insert(*input) {
            return Err(TransactionError::DuplicateInput(*input));
        }
    }

    if txn.outputs.iter().any(|o| o.coins == 0) {
        return Err(TransactionError::ZeroCoinOutput);
    }

    let size = txn.size();
    if size > ruleset.max_transaction_size as usize {
        return Err(TransactionError::TooLarge {
            size,
            max: ruleset.max_transaction_size,
        });
    }

    // 2. Existence. A consumed output is absent from the snapshot, so this
    // also rejects double spends against committed blocks.
    for input in &txn.inputs {
        if !utxos.contains(input) {
            return Err(TransactionError::UnknownInput(*input));
        }
    }

    // 3. Signatures: each must verify against the key owning the spent
    // output, over the hash binding this body to that input.
    for (input, sig) in txn.inputs.iter().zip(&txn.sigs) {
        let ux = utxos
            .get(input)
            .ok_or(TransactionError::UnknownInput(*input))?;

        if Address::from_pubkey(&sig.pubkey) != ux.body.owner {
            return Err(TransactionError::InvalidSignature(*input));
        }
        if !sig.pubkey.verify(&txn.signing_hash(input), &sig.sig) {
            return Err(TransactionError::InvalidSignature(*input));
        }
    }

    // 4. Coin conservation and droplet precision
    let input_coins = droplet::sum(
        txn.inputs
            .iter()
            .filter_map(|id| utxos.get(id))
            .map(|ux| ux.body.coins),
    )
    .map_err(|_| TransactionError::Overflow)?;

    let output_coins = txn.output_coins().map_err(|_| TransactionError::Overflow)?;

    if input_coins != output_coins {
        return Err(TransactionError::CoinConservation);
    }

    for output in &txn.outputs {
        droplet::check_precision(output.coins, ruleset.max_droplet_precision).map_err(
            |e| match e {
                DropletError::InvalidPrecision(p) => TransactionError::InvalidPrecision(p),
                _ => TransactionError::Overflow,
            },
        )?;
    }

    // 5. Coin hour economics
    let available = available_hours(txn, utxos, now)?;
    let output_hours = txn
        .output_hours()
        .map_err(|_| TransactionError::HoursOverflow)?;

    if output_hours > available {
        return Err(TransactionError::InsufficientCoinHours);
    }

    let burned = available - output_hours;
    let required = required_fee(available, ruleset.burn_factor);
    if burned < required {
        return Err(TransactionError::InsufficientCoinHourBurn { burned, required });
    }

    Ok(())
}

/// Total coin hours of the transaction's inputs, accrued up to `now`
fn available_hours(
    txn: &Transaction,
    utxos: &UtxoSet,
    now: u64,
) -> Result<u64, TransactionError> {
    txn.inputs
        .iter()
        .map(|id| {
            utxos
                .get(id)
                .map(|ux| ux.coin_hours(now))
                .ok_or(TransactionError::UnknownInput(*id))
        })
        .try_fold(0u64, |acc, h| {
            acc.checked_add(h?).ok_or(TransactionError::HoursOverflow)
        })
}

/// The coin-hour fee a transaction pays: input hours minus output hours.
/// Fails if the inputs are unknown or the outputs claim more hours than
/// are available.
pub fn transaction_fee(
    txn: &Transaction,
    utxos: &UtxoSet,
    now: u64,
) -> Result<u64, TransactionError> {
    let available = available_hours(txn, utxos, now)?;
    let output_hours = txn
        .output_hours()
        .map_err(|_| TransactionError::HoursOverflow)?;

    if output_hours > available {
        return Err(TransactionError::InsufficientCoinHours);
    }

    Ok(available - output_hours)
}
