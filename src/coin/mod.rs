//! Core ledger types: droplet arithmetic, outputs, transactions, blocks

pub mod droplet;

mod block;
mod transaction;
mod uxout;

pub use block::*;
pub use droplet::{DropletError, DROPLET_EXPONENT, DROPLET_MULTIPLIER};
pub use transaction::*;
pub use uxout::*;
