//! SQLite implementation of the local certificate store

mod local_store;

pub use local_store::*;
