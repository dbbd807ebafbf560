//! Cryptography module - BLAKE3 hashing, Schnorr keys, base58 addresses

mod address;
mod hash;
mod keys;

pub use address::*;
pub use hash::*;
pub use keys::*;
