//! # Ledger Sample Library
//!
//! This library exposes the sample application's modules for integration testing.

pub mod clients;
pub mod ledger_actor;
pub mod lifecycle;
pub mod model;
