//! Copies, transactions and diff/patch over node graphs.

mod copy;
pub mod diff;
mod state;
pub mod transaction;

pub use diff::{Change, Patch};
pub use transaction::{Transaction, TransactionState};
