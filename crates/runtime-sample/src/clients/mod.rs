//! # Clients
//!
//! Typed wrappers that hide message passing behind domain methods.

pub mod ledger_client;

pub use ledger_client::LedgerClient;
