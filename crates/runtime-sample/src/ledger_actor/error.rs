//! Error types for the Ledger actor.

use crate::model::{AccountId, Cents};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// The account has not been opened.
    #[error("Account not found: {0}")]
    UnknownAccount(AccountId),

    /// The account is already open.
    #[error("Account already exists: {0}")]
    AccountExists(AccountId),

    /// The withdrawal exceeds the balance.
    #[error("Insufficient funds in {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: AccountId,
        requested: Cents,
        available: Cents,
    },

    /// Zero-amount deposits and withdrawals are rejected.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Cents),

    /// The journal store could not be reached. Fatal for the ledger actor.
    #[error("Journal store error: {0}")]
    Store(String),

    /// An error occurred while communicating with the actor system.
    #[error("Actor communication error: {0}")]
    ActorCommunicationError(String),

    /// The deposit leg of a transfer may or may not have been applied.
    /// No compensation was made; reconcile with [`balance`](crate::clients::LedgerClient::balance).
    #[error("Transfer of {amount} from {from} to {to} has an unknown outcome: {reason}")]
    TransferIndeterminate {
        from: AccountId,
        to: AccountId,
        amount: Cents,
        reason: String,
    },
}

impl LedgerError {
    /// Whether the ledger rejected the request without changing any balance.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            LedgerError::UnknownAccount(_)
                | LedgerError::AccountExists(_)
                | LedgerError::InsufficientFunds { .. }
                | LedgerError::InvalidAmount(_)
        )
    }
}

impl From<String> for LedgerError {
    fn from(msg: String) -> Self {
        LedgerError::ActorCommunicationError(msg)
    }
}
