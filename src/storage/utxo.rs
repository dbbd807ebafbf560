//! The in-memory unspent output set.
//!
//! Keyed by output id. The ledger owns the live set; verifiers operate
//! on read-only snapshots of it.

use std::collections::HashMap;

use crate::coin::UxOut;
use crate::crypto::{Address, Hash};

/// Set of all unspent transaction outputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoSet {
    utxos: HashMap<Hash, UxOut>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
        }
    }

    pub fn contains(&self, id: &Hash) -> bool {
        self.utxos.contains_key(id)
    }

    pub fn get(&self, id: &Hash) -> Option<&UxOut> {
        self.utxos.get(id)
    }

    /// Insert an output. Returns the previous entry if the id was present,
    /// which indicates a hash collision and never happens on a valid chain.
    pub fn add(&mut self, ux: UxOut) -> Option<UxOut> {
        self.utxos.insert(ux.id(), ux)
    }

    /// Remove an output once it has been consumed
    pub fn remove(&mut self, id: &Hash) -> Option<UxOut> {
        self.utxos.remove(id)
    }

    /// All outputs owned by `address`
    pub fn owned_by(&self, address: &Address) -> Vec<&UxOut> {
        let mut outs: Vec<&UxOut> = self
            .utxos
            .values()
            .filter(|ux| ux.body.owner == *address)
            .collect();
        outs.sort_by_key(|ux| ux.id());
        outs
    }

    /// Total coins and coin hours owned by `address` at time `t`
    pub fn balance(&self, address: &Address, t: u64) -> (u64, u64) {
        self.owned_by(address).iter().fold((0, 0), |(c, h), ux| {
            (
                c.saturating_add(ux.body.coins),
                h.saturating_add(ux.coin_hours(t)),
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hash, &UxOut)> {
        self.utxos.iter()
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}
