//! Domain models for the certificate anchoring service
//!
//! Local certificates and anchor batches live in the local store; assets live
//! in the ledger world state. Only identifiers cross between the two.

mod asset;
mod batch;
mod certificate;
mod types;
mod verification;

pub use asset::*;
pub use batch::*;
pub use certificate::*;
pub use types::*;
pub use verification::*;
