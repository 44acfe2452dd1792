//! [`Handler`] implementation for the ledger.
//!
//! Business rule violations (unknown account, insufficient funds) are returned to the
//! caller in the reply and leave the actor running. Losing the journal store is returned
//! as the handler error, which terminates the actor: its balances can no longer be made
//! durable.

use super::error::LedgerError;
use super::messages::{LedgerMessage, LedgerReply};
use crate::model::{AccountId, AuditReport, Cents, JournalEntry, LedgerEvent, StoreFactory};
use actor_runtime::{ActorContext, EventBus, Handled, Handler, Pool};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Balances per account.
pub type Balances = BTreeMap<AccountId, Cents>;

/// Collaborators injected when the ledger starts.
#[derive(Clone)]
pub struct LedgerDeps {
    pub store: Pool<StoreFactory>,
    pub events: EventBus<LedgerEvent>,
    /// Publish an audit this often; `None` disables periodic audits.
    pub audit_every: Option<Duration>,
}

pub struct LedgerHandler;

type Outcome = Result<(Balances, Result<LedgerReply, LedgerError>), LedgerError>;

impl LedgerHandler {
    /// Write `entry` through a pooled connection.
    async fn journal(deps: &LedgerDeps, entry: JournalEntry) -> Result<usize, LedgerError> {
        let mut connection = deps
            .store
            .acquire()
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        match connection.append(entry) {
            Ok(()) => Ok(connection.len()),
            Err(e) => {
                // A connection that failed a write is not handed out again.
                connection.discard();
                Err(LedgerError::Store(e.to_string()))
            }
        }
    }

    async fn apply(balances: Balances, message: LedgerMessage, deps: &LedgerDeps) -> Outcome {
        let mut balances = balances;
        match message {
            LedgerMessage::Open(account) => {
                if balances.contains_key(&account) {
                    return Ok((balances, Err(LedgerError::AccountExists(account))));
                }
                Self::journal(deps, JournalEntry::Open(account.clone())).await?;
                balances.insert(account.clone(), 0);
                deps.events.publish(LedgerEvent::Opened { account }).await;
                Ok((balances, Ok(LedgerReply::Opened)))
            }
            LedgerMessage::Deposit { account, amount } => {
                if amount == 0 {
                    return Ok((balances, Err(LedgerError::InvalidAmount(amount))));
                }
                let Some(&current) = balances.get(&account) else {
                    return Ok((balances, Err(LedgerError::UnknownAccount(account))));
                };
                Self::journal(deps, JournalEntry::Credit(account.clone(), amount)).await?;
                let balance = current.saturating_add(amount);
                balances.insert(account.clone(), balance);
                deps.events
                    .publish(LedgerEvent::Deposited {
                        account,
                        amount,
                        balance,
                    })
                    .await;
                Ok((balances, Ok(LedgerReply::Balance(balance))))
            }
            LedgerMessage::Withdraw { account, amount } => {
                if amount == 0 {
                    return Ok((balances, Err(LedgerError::InvalidAmount(amount))));
                }
                let Some(&current) = balances.get(&account) else {
                    return Ok((balances, Err(LedgerError::UnknownAccount(account))));
                };
                if current < amount {
                    let refused = LedgerError::InsufficientFunds {
                        account,
                        requested: amount,
                        available: current,
                    };
                    return Ok((balances, Err(refused)));
                }
                Self::journal(deps, JournalEntry::Debit(account.clone(), amount)).await?;
                let balance = current - amount;
                balances.insert(account.clone(), balance);
                deps.events
                    .publish(LedgerEvent::Withdrawn {
                        account,
                        amount,
                        balance,
                    })
                    .await;
                Ok((balances, Ok(LedgerReply::Balance(balance))))
            }
            LedgerMessage::Balance(account) => {
                let reply = balances
                    .get(&account)
                    .map(|balance| LedgerReply::Balance(*balance))
                    .ok_or(LedgerError::UnknownAccount(account));
                Ok((balances, reply))
            }
            LedgerMessage::Audit => {
                let journal_len = {
                    let connection = deps
                        .store
                        .acquire()
                        .await
                        .map_err(|e| LedgerError::Store(e.to_string()))?;
                    connection.len()
                };
                let report = AuditReport {
                    accounts: balances.len(),
                    total: balances.values().sum(),
                    journal_len,
                };
                info!(accounts = report.accounts, total = report.total, "Audit");
                deps.events.publish(LedgerEvent::Audited(report.clone())).await;
                Ok((balances, Ok(LedgerReply::Audit(report))))
            }
        }
    }
}

#[async_trait]
impl Handler for LedgerHandler {
    type State = Balances;
    type Message = LedgerMessage;
    type Reply = Result<LedgerReply, LedgerError>;
    type Error = LedgerError;
    type Context = LedgerDeps;

    async fn on_start(
        &self,
        balances: Balances,
        ctx: &ActorContext<Self>,
    ) -> Result<Balances, LedgerError> {
        if let Some(period) = ctx.deps().audit_every {
            match ctx.send_every(period, || LedgerMessage::Audit) {
                Ok(timer) => debug!(task = %timer.id(), ?period, "Periodic audit scheduled"),
                Err(e) => warn!(error = %e, "Periodic audit unavailable"),
            }
        }
        Ok(balances)
    }

    async fn handle(
        &self,
        balances: Balances,
        message: LedgerMessage,
        ctx: &ActorContext<Self>,
    ) -> Handled<Self> {
        let (balances, reply) = Self::apply(balances, message, ctx.deps()).await?;
        if let Err(refused) = &reply {
            debug!(error = %refused, "Request refused");
        }
        Ok((balances, Some(reply)))
    }

    async fn on_stop(&self, balances: Balances, _ctx: &ActorContext<Self>) {
        info!(accounts = balances.len(), "Ledger closed");
    }
}
