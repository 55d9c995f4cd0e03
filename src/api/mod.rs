//! HTTP API for the certificate anchoring service
//!
//! JSON over REST, mounted under `/api`, plus the contract-style root routes.

pub mod error;
mod handlers;
mod rest;
pub mod types;

pub use error::{ApiError, ErrorCode};
pub use rest::*;
