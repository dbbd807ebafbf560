//! Transaction structure and canonical serialization.
//!
//! A transaction spends a set of existing outputs (referenced by output
//! id) and creates new ones. It is immutable once signed: the signing
//! hash covers the canonical body (type tag, inputs, outputs), and each
//! input carries one signature bound to that body.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{hash_bytes, hash_concat, Address, Hash, PublicKey, SecretKey, Signature};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionBuildError {
    #[error("signature count does not match input count")]
    SignatureCountMismatch,
    #[error("duplicate input in transaction")]
    DuplicateInput,
}

/// A created output: destination, coins and assigned coin hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub address: Address,
    pub coins: u64,
    pub hours: u64,
}

/// An input signature together with the public key that produced it.
///
/// The key must hash to the spent output's owning address; verification
/// checks both the signature and that binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSig {
    pub pubkey: PublicKey,
    pub sig: Signature,
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction type tag
    pub version: u8,
    /// Ids of the outputs consumed, in order
    pub inputs: Vec<Hash>,
    /// Outputs created, in order
    pub outputs: Vec<TransactionOutput>,
    /// One signature per input
    pub sigs: Vec<TransactionSig>,
}

impl Transaction {
    pub fn new() -> Self {
        Transaction {
            version: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            sigs: Vec::new(),
        }
    }

    /// Append an input referencing an existing output id
    pub fn push_input(&mut self, id: Hash) -> Result<(), TransactionBuildError> {
        if self.inputs.contains(&id) {
            return Err(TransactionBuildError::DuplicateInput);
        }
        self.inputs.push(id);
        Ok(())
    }

    /// Append an output
    pub fn push_output(&mut self, address: Address, coins: u64, hours: u64) {
        self.outputs.push(TransactionOutput {
            address,
            coins,
            hours,
        });
    }

    /// Canonical serialization of the body: type tag, inputs, outputs.
    /// Signatures are excluded so the hash is stable across signing.
    fn body_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        bytes.push(self.version);

        bytes.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            bytes.extend_from_slice(&input.0);
        }

        bytes.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            bytes.extend_from_slice(&output.address.to_bytes());
            bytes.extend_from_slice(&output.coins.to_le_bytes());
            bytes.extend_from_slice(&output.hours.to_le_bytes());
        }

        bytes
    }

    /// Canonical serialization including signatures
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.body_bytes();

        bytes.extend_from_slice(&(self.sigs.len() as u32).to_le_bytes());
        for sig in &self.sigs {
            bytes.extend_from_slice(&sig.pubkey.0);
            bytes.extend_from_slice(&sig.sig.0);
        }

        bytes
    }

    /// Transaction hash: the hash of the canonical body
    pub fn hash(&self) -> Hash {
        hash_bytes(&self.body_bytes())
    }

    /// Full hash, additionally committing to the signatures
    pub fn hash_full(&self) -> Hash {
        hash_bytes(&self.to_bytes())
    }

    /// Serialized size in bytes, including signatures
    pub fn size(&self) -> usize {
        self.to_bytes().len()
    }

    /// The hash signed for input `idx`: binds the body to the spent output
    pub fn signing_hash(&self, input_id: &Hash) -> Hash {
        hash_concat(&self.hash(), input_id)
    }

    /// Sign every input with the matching secret key, in input order
    pub fn sign_inputs(&mut self, keys: &[SecretKey]) -> Result<(), TransactionBuildError> {
        if keys.len() != self.inputs.len() {
            return Err(TransactionBuildError::SignatureCountMismatch);
        }

        self.sigs = self
            .inputs
            .iter()
            .zip(keys)
            .map(|(input, key)| TransactionSig {
                pubkey: key.public_key(),
                sig: key.sign(&self.signing_hash(input)),
            })
            .collect();

        Ok(())
    }

    /// Sum of output coins, overflow-checked
    pub fn output_coins(&self) -> Result<u64, crate::coin::DropletError> {
        crate::coin::droplet::sum(self.outputs.iter().map(|o| o.coins))
    }

    /// Sum of output hours, overflow-checked
    pub fn output_hours(&self) -> Result<u64, crate::coin::DropletError> {
        crate::coin::droplet::sum(self.outputs.iter().map(|o| o.hours))
    }
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_address() -> Address {
        Address::from_pubkey(&SecretKey::generate().public_key())
    }

    #[test]
    fn test_hash_deterministic() {
        let mut txn = Transaction::new();
        txn.push_input(hash_bytes(b"in")).unwrap();
        txn.push_output(some_address(), 100, 5);
        assert_eq!(txn.hash(), txn.hash());
    }

    #[test]
    fn test_hash_excludes_signatures() {
        let mut txn = Transaction::new();
        txn.push_input(hash_bytes(b"in")).unwrap();
        txn.push_output(some_address(), 100, 5);

        let unsigned_hash = txn.hash();
        txn.sign_inputs(&[SecretKey::generate()]).unwrap();

        assert_eq!(txn.hash(), unsigned_hash);
        assert_ne!(txn.hash_full(), unsigned_hash);
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let mut txn = Transaction::new();
        let id = hash_bytes(b"in");
        txn.push_input(id).unwrap();
        assert_eq!(txn.push_input(id), Err(TransactionBuildError::DuplicateInput));
    }

    #[test]
    fn test_sign_inputs_count_mismatch() {
        let mut txn = Transaction::new();
        txn.push_input(hash_bytes(b"in")).unwrap();
        assert_eq!(
            txn.sign_inputs(&[]),
            Err(TransactionBuildError::SignatureCountMismatch)
        );
    }

    #[test]
    fn test_signatures_verify_per_input() {
        let key = SecretKey::generate();
        let mut txn = Transaction::new();
        txn.push_input(hash_bytes(b"in0")).unwrap();
        txn.push_input(hash_bytes(b"in1")).unwrap();
        txn.push_output(some_address(), 100, 5);
        txn.sign_inputs(&[key.clone(), key.clone()]).unwrap();

        for (input, sig) in txn.inputs.iter().zip(&txn.sigs) {
            assert!(sig.pubkey.verify(&txn.signing_hash(input), &sig.sig));
        }

        // Signatures are bound to their input; swapping fails verification
        assert!(!txn.sigs[0]
            .pubkey
            .verify(&txn.signing_hash(&txn.inputs[1]), &txn.sigs[0].sig));
    }

    #[test]
    fn test_size_counts_signatures() {
        let mut txn = Transaction::new();
        txn.push_input(hash_bytes(b"in")).unwrap();
        txn.push_output(some_address(), 100, 5);

        let unsigned = txn.size();
        txn.sign_inputs(&[SecretKey::generate()]).unwrap();
        assert!(txn.size() > unsigned);
    }

    #[test]
    fn test_output_sums_checked() {
        let mut txn = Transaction::new();
        txn.push_output(some_address(), u64::MAX, 1);
        txn.push_output(some_address(), 1, 1);
        assert!(txn.output_coins().is_err());
        assert_eq!(txn.output_hours(), Ok(2));
    }
}
