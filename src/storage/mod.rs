//! In-memory UTXO set and on-disk chain persistence

mod db;
mod utxo;

pub use db::{ChainDb, StorageError};
pub use utxo::UtxoSet;
