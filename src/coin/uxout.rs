//! Unspent transaction outputs and coin-hour accrual.
//!
//! A `UxOut` is created when a transaction executes inside a block and
//! destroyed when a later transaction consumes it. Its id is the hash of
//! the canonical body serialization, which commits to the source
//! transaction, output index, owner, coins and initial hours.

use serde::{Deserialize, Serialize};

use crate::coin::droplet::DROPLET_MULTIPLIER;
use crate::crypto::{hash_bytes, Address, Hash};

/// Seconds per hour, used by the accrual formula
const HOUR_SECONDS: u64 = 3600;

/// Block context in which an output was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UxHead {
    /// Creation block timestamp
    pub time: u64,
    /// Creation block sequence number
    pub bk_seq: u64,
}

/// The output itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UxBody {
    /// Hash of the transaction that created this output
    pub src_txn: Hash,
    /// Index of this output within the source transaction
    pub src_idx: u32,
    /// Owning address
    pub owner: Address,
    /// Amount in droplets
    pub coins: u64,
    /// Coin hours assigned at creation
    pub hours: u64,
}

/// An unspent transaction output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UxOut {
    pub head: UxHead,
    pub body: UxBody,
}

impl UxOut {
    /// Content hash identifying this output; the UTXO set key
    pub fn id(&self) -> Hash {
        let mut bytes = Vec::with_capacity(32 + 4 + 21 + 8 + 8);
        bytes.extend_from_slice(&self.body.src_txn.0);
        bytes.extend_from_slice(&self.body.src_idx.to_le_bytes());
        bytes.extend_from_slice(&self.body.owner.to_bytes());
        bytes.extend_from_slice(&self.body.coins.to_le_bytes());
        bytes.extend_from_slice(&self.body.hours.to_le_bytes());
        hash_bytes(&bytes)
    }

    /// Coin hours available at time `t`.
    ///
    /// `hours(t) = initial + (t - creation_time) * coins / (3600 * 10^6)`,
    /// truncating. Saturates instead of overflowing on extreme inputs, so
    /// the result is monotone non-decreasing in `t`. Times earlier than the
    /// creation time accrue nothing.
    pub fn coin_hours(&self, t: u64) -> u64 {
        let elapsed = t.saturating_sub(self.head.time);
        let coin_seconds = elapsed.saturating_mul(self.body.coins);
        let accrued = coin_seconds / (HOUR_SECONDS * DROPLET_MULTIPLIER);
        self.body.hours.saturating_add(accrued)
    }
}

/// The outputs a transaction creates when executed in the block stamped
/// `(time, bk_seq)`
pub fn create_outputs(
    txn: &crate::coin::Transaction,
    time: u64,
    bk_seq: u64,
) -> Vec<UxOut> {
    txn.outputs
        .iter()
        .enumerate()
        .map(|(idx, out)| UxOut {
            head: UxHead { time, bk_seq },
            body: UxBody {
                src_txn: txn.hash(),
                src_idx: idx as u32,
                owner: out.address,
                coins: out.coins,
                hours: out.hours,
            },
        })
        .collect()
}
