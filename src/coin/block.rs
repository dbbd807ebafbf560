//! Blocks, block headers and genesis construction.
//!
//! A block header commits to the body hash; the header hash is the
//! block's identity and the value signed by the chain's publisher.

use serde::{Deserialize, Serialize};

use crate::coin::transaction::Transaction;
use crate::crypto::{hash_bytes, Address, Hash, PublicKey, SecretKey, Signature};

/// Block format version
pub const BLOCK_VERSION: u32 = 0;

/// Block header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block format version
    pub version: u32,
    /// Block timestamp (seconds since Unix epoch)
    pub time: u64,
    /// Sequence number; genesis is 0
    pub seq: u64,
    /// Header hash of the previous block; zero for genesis
    pub prev_hash: Hash,
    /// Hash of the serialized block body
    pub body_hash: Hash,
    /// Total coin hours destroyed by the body's transactions
    pub fee: u64,
}

impl BlockHeader {
    /// Canonical serialization for hashing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + 8 + 8 + 32 + 32 + 8);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.time.to_le_bytes());
        bytes.extend_from_slice(&self.seq.to_le_bytes());
        bytes.extend_from_slice(&self.prev_hash.0);
        bytes.extend_from_slice(&self.body_hash.0);
        bytes.extend_from_slice(&self.fee.to_le_bytes());
        bytes
    }

    /// The block's identity hash
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }
}

/// Ordered list of transactions in a block
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockBody {
    pub transactions: Vec<Transaction>,
}

impl BlockBody {
    /// Canonical serialization: concatenated transactions with signatures
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for txn in &self.transactions {
            bytes.extend_from_slice(&txn.to_bytes());
        }
        bytes
    }

    pub fn hash(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }

    /// Total serialized transaction bytes
    pub fn size(&self) -> usize {
        self.transactions.iter().map(|t| t.size()).sum()
    }
}

/// A complete block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub head: BlockHeader,
    pub body: BlockBody,
}

impl Block {
    /// Build the block following `prev` with the given transactions.
    /// `fee` is the total coin-hour fee of the body, computed by the caller
    /// against the ledger.
    pub fn new(prev: &BlockHeader, time: u64, fee: u64, transactions: Vec<Transaction>) -> Self {
        let body = BlockBody { transactions };
        let head = BlockHeader {
            version: BLOCK_VERSION,
            time,
            seq: prev.seq + 1,
            prev_hash: prev.hash(),
            body_hash: body.hash(),
            fee,
        };
        Block { head, body }
    }

    /// Construct the genesis block: sequence 0, zero previous hash, one
    /// transaction assigning the entire coin volume (and zero hours) to
    /// `address`. Deterministic in its three inputs.
    pub fn genesis(address: Address, coins: u64, timestamp: u64) -> Self {
        let mut txn = Transaction::new();
        txn.push_output(address, coins, 0);

        let body = BlockBody {
            transactions: vec![txn],
        };
        let head = BlockHeader {
            version: BLOCK_VERSION,
            time: timestamp,
            seq: 0,
            prev_hash: Hash::zero(),
            body_hash: body.hash(),
            fee: 0,
        };
        Block { head, body }
    }

    pub fn hash(&self) -> Hash {
        self.head.hash()
    }

    pub fn is_genesis(&self) -> bool {
        self.head.seq == 0 && self.head.prev_hash.is_zero()
    }
}

/// A block together with the publisher's signature over its header hash.
///
/// Consensus is a signature gate: one authorized publisher produces and
/// signs blocks, every node verifies the signature against the chain's
/// known authority public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBlock {
    pub block: Block,
    pub sig: Signature,
}

impl SignedBlock {
    /// Sign `block` with the chain authority's secret key
    pub fn sign(block: Block, seckey: &SecretKey) -> Self {
        let sig = seckey.sign(&block.hash());
        SignedBlock { block, sig }
    }

    /// Verify the publisher signature against the authority public key
    pub fn verify_sig(&self, pubkey: &PublicKey) -> bool {
        pubkey.verify(&self.block.hash(), &self.sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis_address() -> Address {
        Address::decode("2EuyufQijRLMNZExtXwdvSzezRdgefh2NwD").unwrap()
    }

    #[test]
    fn test_genesis_deterministic() {
        let a = Block::genesis(genesis_address(), 100_000_000, 1578207105);
        let b = Block::genesis(genesis_address(), 100_000_000, 1578207105);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.head.body_hash, b.head.body_hash);
    }

    #[test]
    fn test_genesis_shape() {
        let g = Block::genesis(genesis_address(), 100_000_000, 1578207105);
        assert!(g.is_genesis());
        assert_eq!(g.head.seq, 0);
        assert_eq!(g.head.fee, 0);
        assert_eq!(g.body.transactions.len(), 1);

        let txn = &g.body.transactions[0];
        assert!(txn.inputs.is_empty());
        assert!(txn.sigs.is_empty());
        assert_eq!(txn.outputs.len(), 1);
        assert_eq!(txn.outputs[0].coins, 100_000_000);
        assert_eq!(txn.outputs[0].hours, 0);
    }

    #[test]
    fn test_genesis_hash_varies_with_inputs() {
        let a = Block::genesis(genesis_address(), 100_000_000, 1578207105);
        let b = Block::genesis(genesis_address(), 100_000_000, 1578207106);
        let c = Block::genesis(genesis_address(), 100_000_001, 1578207105);
        assert_ne!(a.hash(), b.hash());
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn test_header_commits_to_body() {
        let g = Block::genesis(genesis_address(), 100_000_000, 1578207105);
        assert_eq!(g.head.body_hash, g.body.hash());
    }

    #[test]
    fn test_block_linkage() {
        let g = Block::genesis(genesis_address(), 100_000_000, 1578207105);
        let next = Block::new(&g.head, g.head.time + 10, 0, vec![]);
        assert_eq!(next.head.seq, 1);
        assert_eq!(next.head.prev_hash, g.hash());
        assert!(!next.is_genesis());
    }

    #[test]
    fn test_signed_block_verifies() {
        let seckey = SecretKey::generate();
        let g = Block::genesis(genesis_address(), 100_000_000, 1578207105);
        let signed = SignedBlock::sign(g, &seckey);

        assert!(signed.verify_sig(&seckey.public_key()));
        assert!(!signed.verify_sig(&SecretKey::generate().public_key()));
    }
}
