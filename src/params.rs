//! Protocol parameters and transaction verification rulesets.
//!
//! Two `VerifyTxn` instances are configured per node: one applied to
//! transactions admitted to the unconfirmed pool, one applied when
//! selecting transactions for a new block. Both must be at least as
//! strict as the hard protocol minimums below; that is enforced by the
//! configuration builder at startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coin::DROPLET_EXPONENT;

/// Hard protocol minimum for the coin-hour burn factor
pub const MIN_BURN_FACTOR: u32 = 2;

/// Hard protocol minimum for the maximum transaction size, in bytes
pub const MIN_TRANSACTION_SIZE: u32 = 1024;

/// Default burn factor for user-created transactions
pub const USER_BURN_FACTOR: u32 = 10;

/// Default maximum transaction size for user-created transactions, in bytes
pub const USER_MAX_TRANSACTION_SIZE: u32 = 32 * 1024;

/// Default maximum droplet precision for user-created transactions
pub const USER_MAX_DROPLET_PRECISION: u8 = 3;

/// Default maximum total size of transactions in a block, in bytes
pub const DEFAULT_MAX_BLOCK_TRANSACTIONS_SIZE: u32 = 32 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("burn factor {0} is below the protocol minimum {MIN_BURN_FACTOR}")]
    BurnFactorTooLow(u32),
    #[error("max transaction size {0} is below the protocol minimum {MIN_TRANSACTION_SIZE}")]
    MaxTransactionSizeTooLow(u32),
    #[error("max droplet precision {0} exceeds the droplet exponent {DROPLET_EXPONENT}")]
    MaxDropletPrecisionTooHigh(u8),
    #[error("invalid value for environment variable {0}")]
    InvalidEnvValue(&'static str),
}

/// Transaction verification ruleset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyTxn {
    /// At least 1/burn_factor of a transaction's available coin hours
    /// must be destroyed
    pub burn_factor: u32,
    /// Maximum serialized transaction size in bytes
    pub max_transaction_size: u32,
    /// Maximum number of nonzero low-order decimal places in output amounts
    pub max_droplet_precision: u8,
}

impl VerifyTxn {
    /// The default ruleset for user-created transactions
    pub fn user_defaults() -> Self {
        VerifyTxn {
            burn_factor: USER_BURN_FACTOR,
            max_transaction_size: USER_MAX_TRANSACTION_SIZE,
            max_droplet_precision: USER_MAX_DROPLET_PRECISION,
        }
    }

    /// User defaults with `USER_BURN_FACTOR`, `USER_MAX_TXN_SIZE` and
    /// `USER_MAX_DECIMALS` environment overrides applied
    pub fn user_from_env() -> Result<Self, ParamsError> {
        let mut v = Self::user_defaults();
        if let Some(burn) = env_u32("USER_BURN_FACTOR")? {
            v.burn_factor = burn;
        }
        if let Some(size) = env_u32("USER_MAX_TXN_SIZE")? {
            v.max_transaction_size = size;
        }
        if let Some(decimals) = env_u32("USER_MAX_DECIMALS")? {
            v.max_droplet_precision =
                u8::try_from(decimals).map_err(|_| ParamsError::InvalidEnvValue("USER_MAX_DECIMALS"))?;
        }
        v.validate()?;
        Ok(v)
    }

    /// Check this ruleset against the hard protocol minimums
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.burn_factor < MIN_BURN_FACTOR {
            return Err(ParamsError::BurnFactorTooLow(self.burn_factor));
        }
        if self.max_transaction_size < MIN_TRANSACTION_SIZE {
            return Err(ParamsError::MaxTransactionSizeTooLow(
                self.max_transaction_size,
            ));
        }
        if self.max_droplet_precision > DROPLET_EXPONENT {
            return Err(ParamsError::MaxDropletPrecisionTooHigh(
                self.max_droplet_precision,
            ));
        }
        Ok(())
    }
}

fn env_u32(name: &'static str) -> Result<Option<u32>, ParamsError> {
    match std::env::var(name) {
        Ok(s) => s
            .parse::<u32>()
            .map(Some)
            .map_err(|_| ParamsError::InvalidEnvValue(name)),
        Err(_) => Ok(None),
    }
}

/// Minimum coin-hour fee a transaction must burn: ceil(hours / burn_factor).
/// A zero burn factor requires no burn.
pub fn required_fee(hours: u64, burn_factor: u32) -> u64 {
    if burn_factor == 0 {
        return 0;
    }
    let factor = burn_factor as u64;
    let fee = hours / factor;
    if hours % factor != 0 {
        fee + 1
    } else {
        fee
    }
}
