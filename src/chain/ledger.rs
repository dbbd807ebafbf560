//! The authoritative UTXO ledger.
//!
//! A single logical writer applies committed blocks in strict sequence
//! order; the live set is always exactly the outputs created by
//! committed blocks minus those consumed. Replaying the same blocks from
//! genesis reproduces the set exactly, which is what the integrity
//! verifier and the rollback path rely on.

use thiserror::Error;

use crate::coin::{create_outputs, Block, BlockHeader, UxOut};
use crate::crypto::Hash;
use crate::storage::UtxoSet;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("block {0} already applied")]
    AlreadyApplied(u64),
    #[error("block {seq} applied out of order; expected {expected}")]
    OutOfOrder { expected: u64, seq: u64 },
    #[error("block {seq} does not link to the current head")]
    BrokenLink { seq: u64 },
    #[error("first block must be the genesis block")]
    NotGenesis,
    #[error("transaction input {0} does not exist")]
    MissingInput(Hash),
    #[error("rollback target {target} is beyond head {head}")]
    RollbackBeyondHead { target: u64, head: u64 },
}

/// The set of changes a block application made to the UTXO set
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtxoDelta {
    /// Ids of outputs consumed
    pub spent: Vec<Hash>,
    /// Outputs created
    pub created: Vec<UxOut>,
}

/// Live UTXO set plus the header of the last applied block
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    utxo: UtxoSet,
    head: Option<BlockHeader>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header of the most recently applied block
    pub fn head(&self) -> Option<&BlockHeader> {
        self.head.as_ref()
    }

    pub fn head_seq(&self) -> Option<u64> {
        self.head.map(|h| h.seq)
    }

    /// Read-only view of the live UTXO set
    pub fn snapshot(&self) -> &UtxoSet {
        &self.utxo
    }

    /// Apply a committed block: consume every transaction input, create
    /// every output stamped with the block's time and sequence.
    ///
    /// The block's transactions must already be verified. Sequence order
    /// is still enforced here, and the set is left untouched on any
    /// failure.
    pub fn apply_block(&mut self, block: &Block) -> Result<UtxoDelta, LedgerError> {
        match &self.head {
            None => {
                if !block.is_genesis() {
                    return Err(LedgerError::NotGenesis);
                }
            }
            Some(head) => {
                if block.head.seq <= head.seq {
                    return Err(LedgerError::AlreadyApplied(block.head.seq));
                }
                if block.head.seq != head.seq + 1 {
                    return Err(LedgerError::OutOfOrder {
                        expected: head.seq + 1,
                        seq: block.head.seq,
                    });
                }
                if block.head.prev_hash != head.hash() {
                    return Err(LedgerError::BrokenLink {
                        seq: block.head.seq,
                    });
                }
            }
        }

        let delta = self.compute_delta(block)?;

        for id in &delta.spent {
            self.utxo.remove(id);
        }
        for ux in &delta.created {
            self.utxo.add(*ux);
        }
        self.head = Some(block.head);

        Ok(delta)
    }

    /// Walk the block's transactions without mutating, checking that every
    /// input exists (in the live set or created earlier in this block)
    fn compute_delta(&self, block: &Block) -> Result<UtxoDelta, LedgerError> {
        let mut delta = UtxoDelta::default();
        let mut in_block: std::collections::HashSet<Hash> = std::collections::HashSet::new();

        for txn in &block.body.transactions {
            for input in &txn.inputs {
                let live = self.utxo.contains(input) && !delta.spent.contains(input);
                let created_here = in_block.contains(input);
                if !live && !created_here {
                    return Err(LedgerError::MissingInput(*input));
                }
                if created_here {
                    in_block.remove(input);
                }
                delta.spent.push(*input);
            }
            for ux in create_outputs(txn, block.head.time, block.head.seq) {
                in_block.insert(ux.id());
                delta.created.push(ux);
            }
        }

        // Outputs created and consumed within the same block never reach
        // the live set
        delta.created.retain(|ux| in_block.contains(&ux.id()));
        delta.spent.retain(|id| self.utxo.contains(id));

        Ok(delta)
    }

    /// Rebuild a ledger from scratch by replaying blocks in order
    pub fn rebuild<'a, I>(blocks: I) -> Result<Ledger, LedgerError>
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let mut ledger = Ledger::new();
        for block in blocks {
            ledger.apply_block(block)?;
        }
        Ok(ledger)
    }

    /// Undo every block after `target` by replaying the chain prefix from
    /// genesis. Used only by the integrity verifier's recovery path.
    pub fn rollback<'a, I>(&mut self, blocks: I, target: u64) -> Result<(), LedgerError>
    where
        I: IntoIterator<Item = &'a Block>,
    {
        let head = self.head_seq().unwrap_or(0);
        if target > head {
            return Err(LedgerError::RollbackBeyondHead { target, head });
        }

        let prefix = blocks.into_iter().take_while(|b| b.head.seq <= target);
        *self = Ledger::rebuild(prefix)?;
        Ok(())
    }
}
