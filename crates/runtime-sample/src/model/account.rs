use std::fmt::Display;

/// Type-safe identifier for ledger accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AccountId(pub String);

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "account_{}", self.0)
    }
}

/// Amounts are whole cents.
pub type Cents = u64;

/// Published on the event bus after every committed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    Opened {
        account: AccountId,
    },
    Deposited {
        account: AccountId,
        amount: Cents,
        balance: Cents,
    },
    Withdrawn {
        account: AccountId,
        amount: Cents,
        balance: Cents,
    },
    Audited(AuditReport),
}

impl LedgerEvent {
    pub fn account(&self) -> Option<&AccountId> {
        match self {
            LedgerEvent::Opened { account }
            | LedgerEvent::Deposited { account, .. }
            | LedgerEvent::Withdrawn { account, .. } => Some(account),
            LedgerEvent::Audited(_) => None,
        }
    }
}

/// Snapshot of the whole ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub accounts: usize,
    pub total: Cents,
    /// Journal entries written so far, as seen by the store.
    pub journal_len: usize,
}
