//! VELA (VLA) Ledger Core Library
//!
//! A deterministic UTXO cryptocurrency core with single-publisher
//! consensus, coin-hour accrual, and full-chain integrity verification.
//!
//! VLA is the ticker used in deployment documents and protocol
//! identifiers.

pub mod chain;
pub mod coin;
pub mod config;
pub mod crypto;
pub mod integrity;
pub mod params;
pub mod storage;
pub mod validation;
