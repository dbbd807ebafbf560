//! Chain orchestration.
//!
//! `Blockchain` ties the persistent store to the in-memory ledger. On
//! open it replays every stored block to reconstruct the UTXO set, then
//! every committed block passes full validation before it is applied and
//! persisted.

mod assembler;
mod ledger;

pub use assembler::{assemble_block, select_transactions, AssembleError};
pub use ledger::{Ledger, LedgerError, UtxoDelta};

use log::info;
use thiserror::Error;

use crate::coin::{Block, BlockHeader, SignedBlock, Transaction};
use crate::crypto::{PublicKey, SecretKey};
use crate::params::VerifyTxn;
use crate::storage::{ChainDb, StorageError, UtxoSet};
use crate::validation::{verify_block, BlockError};

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("chain has no blocks")]
    EmptyChain,
    #[error("genesis block rejected: {0}")]
    BadGenesis(String),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// The chain state machine: persistent blocks plus the live UTXO set
pub struct Blockchain {
    db: ChainDb,
    ledger: Ledger,
    authority: PublicKey,
    ruleset: VerifyTxn,
    max_block_transactions_size: u32,
}

impl Blockchain {
    /// Open a chain over `db`, replaying stored blocks to rebuild the
    /// UTXO set. An empty database yields an empty chain awaiting its
    /// genesis block.
    pub fn open(
        db: ChainDb,
        authority: PublicKey,
        ruleset: VerifyTxn,
        max_block_transactions_size: u32,
    ) -> Result<Self, ChainError> {
        let mut ledger = Ledger::new();
        for block in db.blocks() {
            let block = block?;
            ledger.apply_block(&block.block)?;
        }
        if let Some(seq) = ledger.head_seq() {
            info!("chain opened at sequence {seq}");
        }
        Ok(Self {
            db,
            ledger,
            authority,
            ruleset,
            max_block_transactions_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.head().is_none()
    }

    /// Header of the last committed block
    pub fn head(&self) -> Result<&BlockHeader, ChainError> {
        self.ledger.head().ok_or(ChainError::EmptyChain)
    }

    /// Live UTXO set
    pub fn snapshot(&self) -> &UtxoSet {
        self.ledger.snapshot()
    }

    /// Install the genesis block into an empty chain
    pub fn init_genesis(&mut self, signed: &SignedBlock) -> Result<(), ChainError> {
        if !self.is_empty() {
            return Err(ChainError::BadGenesis("chain is not empty".into()));
        }
        if !signed.block.is_genesis() {
            return Err(ChainError::BadGenesis("block is not a genesis block".into()));
        }
        if !signed.verify_sig(&self.authority) {
            return Err(ChainError::BadGenesis(
                "signature does not match the chain authority".into(),
            ));
        }

        let delta = self.ledger.apply_block(&signed.block)?;
        self.db.save_block(signed)?;
        self.db.update_utxos(&delta.spent, &delta.created)?;
        info!("genesis block {} installed", signed.block.head.hash());
        Ok(())
    }

    /// Validate a signed block against the current head and, if it
    /// passes, commit it: apply to the ledger and persist block and UTXO
    /// changes.
    pub fn execute_block(&mut self, signed: &SignedBlock) -> Result<(), ChainError> {
        let head = self.ledger.head().ok_or(ChainError::EmptyChain)?;
        verify_block(
            signed,
            head,
            self.ledger.snapshot(),
            &self.ruleset,
            self.max_block_transactions_size,
            &self.authority,
        )?;

        let delta = self.ledger.apply_block(&signed.block)?;
        self.db.save_block(signed)?;
        self.db.update_utxos(&delta.spent, &delta.created)?;
        info!(
            "committed block {} at sequence {}",
            signed.block.head.hash(),
            signed.block.head.seq
        );
        Ok(())
    }

    /// Assemble the next block from `pool` without committing it
    pub fn create_block(
        &self,
        pool: &[Transaction],
        time: u64,
    ) -> Result<Block, ChainError> {
        let head = self.ledger.head().ok_or(ChainError::EmptyChain)?;
        let block = assemble_block(
            head,
            self.ledger.snapshot(),
            pool,
            &self.ruleset,
            self.max_block_transactions_size,
            time,
        )?;
        Ok(block)
    }

    /// Assemble, sign with the publisher key, commit, and return the
    /// signed block for distribution
    pub fn publish_block(
        &mut self,
        pool: &[Transaction],
        time: u64,
        publisher: &SecretKey,
    ) -> Result<SignedBlock, ChainError> {
        let block = self.create_block(pool, time)?;
        let signed = SignedBlock::sign(block, publisher);
        self.execute_block(&signed)?;
        Ok(signed)
    }

    /// Underlying database handle
    pub fn db(&self) -> &ChainDb {
        &self.db
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coin::DROPLET_MULTIPLIER;
    use crate::crypto::Address;
    use crate::params;

    const GENESIS_TIME: u64 = 1_578_207_105;

    fn open_chain(dir: &std::path::Path, authority: &SecretKey) -> Blockchain {
        let db = ChainDb::open(dir).unwrap();
        Blockchain::open(
            db,
            authority.public_key(),
            params::VerifyTxn::user_defaults(),
            params::DEFAULT_MAX_BLOCK_TRANSACTIONS_SIZE,
        )
        .unwrap()
    }

    fn signed_genesis(authority: &SecretKey, owner: &SecretKey) -> SignedBlock {
        let block = Block::genesis(
            Address::from_pubkey(&owner.public_key()),
            100 * DROPLET_MULTIPLIER,
            GENESIS_TIME,
        );
        SignedBlock::sign(block, authority)
    }

    fn spend(chain: &Blockchain, owner: &SecretKey, now: u64) -> Transaction {
        let addr = Address::from_pubkey(&owner.public_key());
        let ux = *chain.snapshot().owned_by(&addr)[0];
        let mut txn = Transaction::new();
        txn.push_input(ux.id()).unwrap();
        txn.push_output(addr, ux.body.coins, 0);
        txn.sign_inputs(&[owner.clone()]).unwrap();
        txn
    }

    #[test]
    fn test_empty_chain_awaits_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let authority = SecretKey::generate();
        let chain = open_chain(dir.path(), &authority);
        assert!(chain.is_empty());
        assert!(matches!(chain.head(), Err(ChainError::EmptyChain)));
    }

    #[test]
    fn test_genesis_requires_authority_signature() {
        let dir = tempfile::tempdir().unwrap();
        let authority = SecretKey::generate();
        let owner = SecretKey::generate();
        let mut chain = open_chain(dir.path(), &authority);

        let forged = signed_genesis(&SecretKey::generate(), &owner);
        assert!(matches!(
            chain.init_genesis(&forged),
            Err(ChainError::BadGenesis(_))
        ));

        let genuine = signed_genesis(&authority, &owner);
        chain.init_genesis(&genuine).unwrap();
        assert_eq!(chain.head().unwrap().seq, 0);
    }

    #[test]
    fn test_publish_and_execute() {
        let dir = tempfile::tempdir().unwrap();
        let authority = SecretKey::generate();
        let owner = SecretKey::generate();
        let mut chain = open_chain(dir.path(), &authority);
        chain.init_genesis(&signed_genesis(&authority, &owner)).unwrap();

        let now = GENESIS_TIME + 3600 * 10;
        let txn = spend(&chain, &owner, now);
        let signed = chain.publish_block(&[txn], now, &authority).unwrap();

        assert_eq!(chain.head().unwrap().seq, 1);
        assert_eq!(signed.block.head.seq, 1);
        assert_eq!(chain.snapshot().len(), 1);
    }

    #[test]
    fn test_forged_block_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let authority = SecretKey::generate();
        let owner = SecretKey::generate();
        let mut chain = open_chain(dir.path(), &authority);
        chain.init_genesis(&signed_genesis(&authority, &owner)).unwrap();

        let now = GENESIS_TIME + 3600 * 10;
        let txn = spend(&chain, &owner, now);
        let block = chain.create_block(&[txn], now).unwrap();
        let forged = SignedBlock::sign(block, &SecretKey::generate());

        assert!(matches!(
            chain.execute_block(&forged),
            Err(ChainError::Block(BlockError::Untrusted))
        ));
        assert_eq!(chain.head().unwrap().seq, 0);
    }

    #[test]
    fn test_reopen_replays_chain() {
        let dir = tempfile::tempdir().unwrap();
        let authority = SecretKey::generate();
        let owner = SecretKey::generate();

        let expected_seq;
        let expected_len;
        {
            let mut chain = open_chain(dir.path(), &authority);
            chain.init_genesis(&signed_genesis(&authority, &owner)).unwrap();
            let now = GENESIS_TIME + 3600 * 10;
            let txn = spend(&chain, &owner, now);
            chain.publish_block(&[txn], now, &authority).unwrap();
            expected_seq = chain.head().unwrap().seq;
            expected_len = chain.snapshot().len();
        }

        let reopened = open_chain(dir.path(), &authority);
        assert_eq!(reopened.head().unwrap().seq, expected_seq);
        assert_eq!(reopened.snapshot().len(), expected_len);
    }
}
