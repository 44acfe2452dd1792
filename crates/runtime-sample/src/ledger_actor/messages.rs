//! Messages accepted by the Ledger actor and its replies.

use crate::model::{AccountId, AuditReport, Cents};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerMessage {
    Open(AccountId),
    Deposit { account: AccountId, amount: Cents },
    Withdraw { account: AccountId, amount: Cents },
    Balance(AccountId),
    /// Publish an [`AuditReport`]; also sent periodically when auditing is enabled.
    Audit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerReply {
    Opened,
    /// Balance after the operation
    Balance(Cents),
    Audit(AuditReport),
}
