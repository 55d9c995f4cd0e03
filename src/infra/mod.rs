//! Infrastructure layer for certificate anchoring
//!
//! Contains trait definitions and implementations for:
//! - Local certificate store (SQLite)
//! - Ledger gateway seam
//! - Anchoring coordinator (batching, submission, write-back, reconciliation)
//! - Verification against anchored roots
//! - Background anchoring worker
//! - Retry with backoff

mod coordinator;
mod error;
mod retry;
pub mod sqlite;
mod traits;
mod verifier;
mod worker;

pub use coordinator::*;
pub use error::*;
pub use retry::{is_retryable_db_error, Retry, RetryConfig, RetryResult};
pub use sqlite::SqliteLocalStore;
pub use traits::*;
pub use verifier::*;
pub use worker::*;
