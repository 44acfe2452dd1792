//! # Observability & Tracing
//!
//! This module provides the tracing infrastructure for the runtime and anything built on it.
//!
//! ## Configuration
//!
//! [`setup_tracing`] uses a compact format that hides the crate/module prefix
//! (`with_target(false)`). Log levels come from the `RUST_LOG` environment variable.
//!
//! ## What Gets Traced
//!
//! - **Actor Lifecycle**: `Actor started`, `Shutdown` with the exit reason and message count
//! - **Failures**: handler errors and panics with `actor`, `handler` and `error` fields
//! - **Pool**: slot creation, retirement and acquire timeouts
//! - **Scheduler**: each firing runs inside a `scheduled` span carrying the task id
//! - **Bus**: subscribe/unsubscribe
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle only
//! RUST_LOG=info cargo run -p runtime-sample
//!
//! # Every delivered payload
//! RUST_LOG=debug cargo run -p runtime-sample
//!
//! # Filter to the pool
//! RUST_LOG=actor_runtime::pool=debug cargo run -p runtime-sample
//! ```
//!
//! With `RUST_LOG=debug` each message is logged **once**, when it is delivered:
//!
//! ```text
//! DEBUG Deliver actor=actor-1 payload=Deposit { account: "alice", amount: 100 } expects_reply=true
//! INFO Actor started actor=actor-2 handler="LedgerHandler"
//! INFO Shutdown actor=actor-2 handler="LedgerHandler" processed=4 reason=stopped
//! ```

/// Initializes structured logging for the process.
///
/// Panics if a global subscriber is already installed; use [`try_setup_tracing`] where
/// that can happen (tests, embedding).
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but returns `false` instead of panicking when a subscriber is
/// already installed.
pub fn try_setup_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init()
        .is_ok()
}
