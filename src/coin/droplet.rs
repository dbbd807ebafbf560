//! Fixed-point coin arithmetic.
//!
//! Coin amounts are u64 counts of droplets, the smallest indivisible
//! unit. One whole VLA is `DROPLET_MULTIPLIER` droplets. All arithmetic
//! is overflow-checked; amounts may additionally be constrained to a
//! maximum droplet precision (number of nonzero low-order decimals).

use thiserror::Error;

/// Number of decimal places in a whole coin
pub const DROPLET_EXPONENT: u8 = 6;

/// Droplets per whole coin (10^DROPLET_EXPONENT)
pub const DROPLET_MULTIPLIER: u64 = 1_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DropletError {
    #[error("coin arithmetic overflow")]
    Overflow,
    #[error("amount exceeds maximum droplet precision of {0} decimal places")]
    InvalidPrecision(u8),
    #[error("invalid coin amount string")]
    InvalidAmount,
}

/// Overflow-checked addition of two droplet amounts
pub fn add(a: u64, b: u64) -> Result<u64, DropletError> {
    a.checked_add(b).ok_or(DropletError::Overflow)
}

/// Overflow-checked subtraction of two droplet amounts
pub fn sub(a: u64, b: u64) -> Result<u64, DropletError> {
    a.checked_sub(b).ok_or(DropletError::Overflow)
}

/// Overflow-checked multiplication of a droplet amount by a factor
pub fn mul(coins: u64, factor: u64) -> Result<u64, DropletError> {
    coins.checked_mul(factor).ok_or(DropletError::Overflow)
}

/// Checked sum of a sequence of droplet amounts
pub fn sum<I: IntoIterator<Item = u64>>(amounts: I) -> Result<u64, DropletError> {
    amounts.into_iter().try_fold(0u64, add)
}

/// Check that `coins` has no more than `max_precision` nonzero decimal places.
///
/// With `max_precision = 3`, amounts must be multiples of 10^(6-3) = 1000
/// droplets (0.001 VLA).
pub fn check_precision(coins: u64, max_precision: u8) -> Result<(), DropletError> {
    if max_precision >= DROPLET_EXPONENT {
        return Ok(());
    }
    let unit = 10u64.pow((DROPLET_EXPONENT - max_precision) as u32);
    if coins % unit != 0 {
        return Err(DropletError::InvalidPrecision(max_precision));
    }
    Ok(())
}

/// Format a droplet amount as a decimal coin string, e.g. `1.5`
pub fn to_string(droplets: u64) -> String {
    let whole = droplets / DROPLET_MULTIPLIER;
    let frac = droplets % DROPLET_MULTIPLIER;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:06}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Parse a decimal coin string into droplets, rejecting excess precision
pub fn from_string(s: &str) -> Result<u64, DropletError> {
    let (whole_str, frac_str) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole_str.is_empty() || frac_str.len() > DROPLET_EXPONENT as usize {
        return Err(DropletError::InvalidAmount);
    }

    let whole: u64 = whole_str.parse().map_err(|_| DropletError::InvalidAmount)?;

    let mut frac: u64 = 0;
    if !frac_str.is_empty() {
        frac = frac_str.parse().map_err(|_| DropletError::InvalidAmount)?;
        frac *= 10u64.pow((DROPLET_EXPONENT as usize - frac_str.len()) as u32);
    }

    add(mul(whole, DROPLET_MULTIPLIER)?, frac)
}
