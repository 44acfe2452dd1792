//! # Domain Model
//!
//! Plain data shared by the ledger actor, its clients and its listeners.
//!
//! - [`account`] - account identifiers and the events the ledger publishes
//! - [`store`] - the journal store and its pooled connections

pub mod account;
pub mod store;

pub use account::*;
pub use store::*;
