//! # Ledger Client
//!
//! Provides a high‑level API for interacting with the Ledger actor.
//! It wraps an `ActorRef<LedgerHandler>` and exposes domain‑specific methods.
use crate::ledger_actor::{LedgerError, LedgerHandler, LedgerMessage, LedgerReply};
use crate::model::{AccountId, AuditReport, Cents};
use actor_runtime::{ActorClient, ActorError, ActorRef};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{instrument, warn};

/// Client for interacting with the Ledger actor.
#[derive(Clone)]
pub struct LedgerClient {
    inner: ActorRef<LedgerHandler>,
    ask_timeout: Duration,
}

impl LedgerClient {
    pub fn new(inner: ActorRef<LedgerHandler>) -> Self {
        Self {
            inner,
            ask_timeout: actor_runtime::config::ASK_TIMEOUT_DEFAULT,
        }
    }

    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }
}

#[async_trait]
impl ActorClient<LedgerHandler> for LedgerClient {
    type Error = LedgerError;

    fn inner(&self) -> &ActorRef<LedgerHandler> {
        &self.inner
    }

    fn map_error(e: ActorError) -> Self::Error {
        LedgerError::ActorCommunicationError(e.to_string())
    }

    fn ask_timeout(&self) -> Duration {
        self.ask_timeout
    }
}

fn unexpected(reply: LedgerReply) -> LedgerError {
    LedgerError::ActorCommunicationError(format!("unexpected reply {reply:?}"))
}

impl LedgerClient {
    #[instrument(skip(self))]
    pub async fn open_account(&self, account: AccountId) -> Result<(), LedgerError> {
        match self.request(LedgerMessage::Open(account)).await?? {
            LedgerReply::Opened => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Returns the balance after the deposit.
    #[instrument(skip(self))]
    pub async fn deposit(&self, account: AccountId, amount: Cents) -> Result<Cents, LedgerError> {
        self.expect_balance(LedgerMessage::Deposit { account, amount }).await
    }

    /// Returns the balance after the withdrawal.
    #[instrument(skip(self))]
    pub async fn withdraw(&self, account: AccountId, amount: Cents) -> Result<Cents, LedgerError> {
        self.expect_balance(LedgerMessage::Withdraw { account, amount }).await
    }

    #[instrument(skip(self))]
    pub async fn balance(&self, account: AccountId) -> Result<Cents, LedgerError> {
        self.expect_balance(LedgerMessage::Balance(account)).await
    }

    #[instrument(skip(self))]
    pub async fn audit(&self) -> Result<AuditReport, LedgerError> {
        match self.request(LedgerMessage::Audit).await?? {
            LedgerReply::Audit(report) => Ok(report),
            other => Err(unexpected(other)),
        }
    }

    /// Move `amount` from one account to another.
    ///
    /// The ledger has no multi-account transaction, so this is a withdrawal followed by a
    /// deposit. If the ledger refuses the deposit, the withdrawal is compensated by
    /// crediting `from` again and the refusal is returned.
    ///
    /// A deposit that fails any other way (a timed-out ask, a terminated ledger) may still
    /// commit, so no compensation is attempted and
    /// [`LedgerError::TransferIndeterminate`] is returned.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Cents,
    ) -> Result<(), LedgerError> {
        self.withdraw(from.clone(), amount).await?;
        match self.deposit(to.clone(), amount).await {
            Ok(_) => Ok(()),
            Err(refused) if refused.is_refusal() => {
                if let Err(e) = self.deposit(from.clone(), amount).await {
                    warn!(account = %from, amount, error = %e, "Compensation failed");
                }
                Err(refused)
            }
            Err(e) => {
                warn!(%from, %to, amount, error = %e, "Transfer outcome unknown");
                Err(LedgerError::TransferIndeterminate {
                    from,
                    to,
                    amount,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn expect_balance(&self, message: LedgerMessage) -> Result<Cents, LedgerError> {
        match self.request(message).await?? {
            LedgerReply::Balance(balance) => Ok(balance),
            other => Err(unexpected(other)),
        }
    }
}
