//! Global anchor ledger
//!
//! - [`contract`] - the deterministic asset contract every validating node runs
//! - [`context`] - the transaction-context capability the platform hands the contract
//! - [`world_state`] - an in-process ledger platform: versioned key-value world
//!   state, simulate-then-validate commits, block log and key history

mod context;
mod contract;
mod error;
mod world_state;

pub use context::*;
pub use contract::*;
pub use error::*;
pub use world_state::*;
