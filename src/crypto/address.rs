//! Base58 addresses with an embedded checksum.
//!
//! An address is derived deterministically from a public key:
//! `key = RIPEMD160(SHA256(SHA256(pubkey)))`, then serialized as
//! `base58(key[20] || version[1] || checksum[4])` where the checksum is
//! the first four bytes of `SHA256(key || version)`. Immutable once
//! created; decoding re-verifies the checksum.

use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::PublicKey;

/// Address version byte for the VELA mainnet
pub const ADDRESS_VERSION: u8 = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid base58 encoding")]
    InvalidBase58,
    #[error("invalid address length")]
    InvalidLength,
    #[error("invalid address version")]
    InvalidVersion,
    #[error("invalid address checksum")]
    InvalidChecksum,
}

/// A 20-byte address plus version byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub key: [u8; 20],
    pub version: u8,
}

impl Address {
    /// Derive an address from a public key
    pub fn from_pubkey(pubkey: &PublicKey) -> Self {
        let first = Sha256::digest(pubkey.0);
        let second = Sha256::digest(first);
        let digest = Ripemd160::digest(second);

        let mut key = [0u8; 20];
        key.copy_from_slice(&digest);

        Address {
            key,
            version: ADDRESS_VERSION,
        }
    }

    /// Decode a base58 address string, verifying length, version and checksum
    pub fn decode(s: &str) -> Result<Self, AddressError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| AddressError::InvalidBase58)?;

        if bytes.len() != 25 {
            return Err(AddressError::InvalidLength);
        }

        let mut key = [0u8; 20];
        key.copy_from_slice(&bytes[0..20]);
        let version = bytes[20];

        if version != ADDRESS_VERSION {
            return Err(AddressError::InvalidVersion);
        }

        let addr = Address { key, version };
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&bytes[21..25]);

        if addr.checksum() != checksum {
            return Err(AddressError::InvalidChecksum);
        }

        Ok(addr)
    }

    /// Serialize to the 21-byte key+version form used in hashing
    pub fn to_bytes(&self) -> [u8; 21] {
        let mut out = [0u8; 21];
        out[0..20].copy_from_slice(&self.key);
        out[20] = self.version;
        out
    }

    /// First four bytes of `SHA256(key || version)`
    fn checksum(&self) -> [u8; 4] {
        let digest = Sha256::digest(self.to_bytes());
        let mut checksum = [0u8; 4];
        checksum.copy_from_slice(&digest[0..4]);
        checksum
    }

    /// Encode to the base58 string form
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(25);
        bytes.extend_from_slice(&self.to_bytes());
        bytes.extend_from_slice(&self.checksum());
        bs58::encode(bytes).into_string()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::decode(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.encode())
    }
}
