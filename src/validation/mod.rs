//! Transaction and block validation rules

pub mod block;
pub mod transaction;

pub use block::{verify_block, BlockError};
pub use transaction::{transaction_fee, verify_transaction, TransactionError};
