//! Persistent chain store backed by sled.
//!
//! Blocks live in a `blocks` tree keyed by big-endian sequence number,
//! so iterating the tree yields the chain in order. The live UTXO set is
//! mirrored into a `utxos` tree keyed by output id, and the `meta` tree
//! records the head sequence and the schema version written by the last
//! application run.

use std::path::Path;

use semver::Version;
use sled::{Db, Tree};
use thiserror::Error;

use crate::coin::SignedBlock;
use crate::crypto::Hash;
use crate::storage::UtxoSet;

const HEAD_SEQ_KEY: &str = "head_seq";
const VERSION_KEY: &str = "version";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sled::Error),
    #[error("corrupt record: {0}")]
    Codec(#[from] bincode::Error),
    #[error("corrupt record: {0}")]
    BadRecord(String),
    #[error("invalid version record: {0}")]
    BadVersion(#[from] semver::Error),
}

/// Handle to the on-disk chain database
#[derive(Debug, Clone)]
pub struct ChainDb {
    db: Db,
    blocks: Tree,
    utxos: Tree,
    meta: Tree,
}

impl ChainDb {
    /// Open or create the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let blocks = db.open_tree("blocks")?;
        let utxos = db.open_tree("utxos")?;
        let meta = db.open_tree("meta")?;
        Ok(Self {
            db,
            blocks,
            utxos,
            meta,
        })
    }

    /// Persist a signed block and advance the stored head sequence
    pub fn save_block(&self, block: &SignedBlock) -> Result<(), StorageError> {
        let seq = block.block.head.seq;
        let value = bincode::serialize(block)?;
        self.blocks.insert(seq.to_be_bytes(), value)?;
        if self.head_seq()?.map_or(true, |head| seq > head) {
            self.meta.insert(HEAD_SEQ_KEY, seq.to_be_bytes().as_ref())?;
        }
        self.db.flush()?;
        Ok(())
    }

    /// Load the signed block at sequence `seq`
    pub fn get_block(&self, seq: u64) -> Result<Option<SignedBlock>, StorageError> {
        match self.blocks.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Sequence of the last saved block
    pub fn head_seq(&self) -> Result<Option<u64>, StorageError> {
        match self.meta.get(HEAD_SEQ_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| StorageError::BadRecord("head_seq".into()))?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Iterate stored blocks in sequence order
    pub fn blocks(&self) -> impl Iterator<Item = Result<SignedBlock, StorageError>> {
        self.blocks.iter().map(|item| {
            let (_, value) = item?;
            Ok(bincode::deserialize(&value)?)
        })
    }

    pub fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.head_seq()?.is_none())
    }

    /// Apply a UTXO delta: remove spent ids, insert created outputs
    pub fn update_utxos(
        &self,
        spent: &[Hash],
        created: &[crate::coin::UxOut],
    ) -> Result<(), StorageError> {
        for id in spent {
            self.utxos.remove(id.0)?;
        }
        for ux in created {
            let value = bincode::serialize(ux)?;
            self.utxos.insert(ux.id().0, value)?;
        }
        self.db.flush()?;
        Ok(())
    }

    /// Load the mirrored UTXO set in full
    pub fn load_utxos(&self) -> Result<UtxoSet, StorageError> {
        let mut set = UtxoSet::new();
        for item in self.utxos.iter() {
            let (_, value) = item?;
            set.add(bincode::deserialize(&value)?);
        }
        Ok(set)
    }

    /// Schema version recorded by the last run, if any
    pub fn version(&self) -> Result<Option<Version>, StorageError> {
        match self.meta.get(VERSION_KEY)? {
            Some(bytes) => {
                let s = std::str::from_utf8(&bytes)
                    .map_err(|_| StorageError::BadRecord("version".into()))?;
                Ok(Some(Version::parse(s)?))
            }
            None => Ok(None),
        }
    }

    /// Record the running application's version
    pub fn set_version(&self, version: &Version) -> Result<(), StorageError> {
        self.meta
            .insert(VERSION_KEY, version.to_string().as_bytes())?;
        self.db.flush()?;
        Ok(())
    }
}
