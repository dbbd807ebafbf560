//! Node configuration.
//!
//! A deployment is described by a `GenesisConfig` JSON document naming
//! the chain authority, the signed genesis block parameters, and the
//! expected genesis hashes. `NodeConfig::builder` cross-checks the
//! document before a node is allowed to start: the genesis block is
//! reconstructed from its parameters and must hash to exactly the
//! declared values, and the declared signature must verify against the
//! authority key. A mismatch is fatal, never a warning.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coin::{Block, SignedBlock};
use crate::crypto::{Address, AddressError, PublicKey, SecretKey, Signature};
use crate::params::{self, ParamsError, VerifyTxn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("invalid genesis address: {0}")]
    Address(#[from] AddressError),
    #[error("genesis {field} does not match the declared value")]
    GenesisHashMismatch { field: &'static str },
    #[error("genesis signature does not verify against the master public key")]
    BadGenesisSignature,
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error("max block transactions size {got} is below the minimum {min}")]
    BlockSizeTooSmall { got: u32, min: u32 },
    #[error("publisher secret key does not match the master public key")]
    PublisherMismatch,
}

/// Genesis block parameters as declared in the deployment document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisBlockConfig {
    /// Address receiving the entire initial supply
    pub address: String,
    /// Initial supply in droplets
    pub coins: u64,
    /// Genesis timestamp
    pub timestamp: u64,
    /// Expected genesis body hash, hex
    pub body_hash: String,
    /// Expected genesis header hash, hex
    pub header_hash: String,
}

/// The deployment document for one coin network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisConfig {
    /// Authority public key, hex. Only blocks signed by this key are
    /// accepted.
    pub master_public_key: String,
    /// Authority signature over the genesis header hash, hex
    pub genesis_signature: String,
    pub genesis_block: GenesisBlockConfig,
    /// Ticker symbol, informational
    pub coin_code: String,
    #[serde(default)]
    pub trusted_peers: Vec<String>,
}

impl GenesisConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Chain authority key
    pub authority: PublicKey,
    /// The reconstructed, authority-signed genesis block
    pub genesis: SignedBlock,
    /// Rules applied to incoming transactions and blocks
    pub ruleset: VerifyTxn,
    /// Rules applied when assembling blocks; at least as strict as
    /// `ruleset` in practice, defaults to it
    pub create_ruleset: VerifyTxn,
    /// Cap on a block body's serialized size
    pub max_block_transactions_size: u32,
    /// Secret key for publishing blocks; only the authority node has one
    pub publisher: Option<SecretKey>,
    /// Ticker symbol
    pub coin_code: String,
}

impl NodeConfig {
    pub fn builder(genesis: GenesisConfig) -> NodeConfigBuilder {
        NodeConfigBuilder {
            genesis,
            ruleset: None,
            create_ruleset: None,
            max_block_transactions_size: params::DEFAULT_MAX_BLOCK_TRANSACTIONS_SIZE,
            publisher: None,
        }
    }
}

pub struct NodeConfigBuilder {
    genesis: GenesisConfig,
    ruleset: Option<VerifyTxn>,
    create_ruleset: Option<VerifyTxn>,
    max_block_transactions_size: u32,
    publisher: Option<SecretKey>,
}

impl NodeConfigBuilder {
    /// Override the default transaction ruleset
    pub fn ruleset(mut self, ruleset: VerifyTxn) -> Self {
        self.ruleset = Some(ruleset);
        self
    }

    /// Override the ruleset used when assembling blocks
    pub fn create_ruleset(mut self, ruleset: VerifyTxn) -> Self {
        self.create_ruleset = Some(ruleset);
        self
    }

    pub fn max_block_transactions_size(mut self, size: u32) -> Self {
        self.max_block_transactions_size = size;
        self
    }

    /// Provide the publishing key; makes this node the block publisher
    pub fn publisher(mut self, key: SecretKey) -> Self {
        self.publisher = Some(key);
        self
    }

    /// Validate the document and produce a runnable configuration
    pub fn build(self) -> Result<NodeConfig, ConfigError> {
        let authority = PublicKey::from_hex(&self.genesis.master_public_key).map_err(|e| {
            ConfigError::InvalidField {
                field: "masterPublicKey",
                reason: e.to_string(),
            }
        })?;

        let gb = &self.genesis.genesis_block;
        let address: Address = gb.address.parse()?;
        let block = Block::genesis(address, gb.coins, gb.timestamp);

        if block.body.hash().to_hex() != gb.body_hash {
            return Err(ConfigError::GenesisHashMismatch { field: "bodyHash" });
        }
        if block.head.hash().to_hex() != gb.header_hash {
            return Err(ConfigError::GenesisHashMismatch { field: "headerHash" });
        }

        let sig = parse_signature(&self.genesis.genesis_signature)?;
        let signed = SignedBlock { block, sig };
        if !signed.verify_sig(&authority) {
            return Err(ConfigError::BadGenesisSignature);
        }

        let ruleset = match self.ruleset {
            Some(r) => r,
            None => VerifyTxn::user_from_env()?,
        };
        let create_ruleset = self.create_ruleset.unwrap_or(ruleset);
        ruleset.validate()?;
        create_ruleset.validate()?;

        if let Some(publisher) = &self.publisher {
            if publisher.public_key() != authority {
                return Err(ConfigError::PublisherMismatch);
            }
        }

        // The block body must be able to hold at least one transaction of
        // the largest size either ruleset admits
        let min_size = ruleset
            .max_transaction_size
            .max(create_ruleset.max_transaction_size)
            .max(params::MIN_TRANSACTION_SIZE);
        if self.max_block_transactions_size < min_size {
            return Err(ConfigError::BlockSizeTooSmall {
                got: self.max_block_transactions_size,
                min: min_size,
            });
        }

        Ok(NodeConfig {
            authority,
            genesis: signed,
            ruleset,
            create_ruleset,
            max_block_transactions_size: self.max_block_transactions_size,
            publisher: self.publisher,
            coin_code: self.genesis.coin_code,
        })
    }
}

fn parse_signature(hex_sig: &str) -> Result<Signature, ConfigError> {
    let bytes = hex::decode(hex_sig).map_err(|e| ConfigError::InvalidField {
        field: "genesisSignature",
        reason: e.to_string(),
    })?;
    let arr: [u8; 64] = bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidField {
            field: "genesisSignature",
            reason: "expected 64 bytes".into(),
        })?;
    Ok(Signature(arr))
}
