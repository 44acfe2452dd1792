//! # Runtime Errors
//!
//! This module defines the error types used throughout the runtime. Each component
//! gets its own enum so callers can match on exactly the failures that component can
//! produce, and [`RuntimeError`] unifies them for orchestration code that deals with
//! several components at once.

use crate::scheduler::TaskId;
use std::time::Duration;

/// Errors returned by actor references.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    #[error("Actor mailbox closed")]
    MailboxClosed,
    #[error("Actor mailbox full (capacity {capacity})")]
    MailboxFull { capacity: usize },
    #[error("Ask timed out after {0:?}")]
    AskTimedOut(Duration),
    #[error("Actor dropped the reply channel")]
    AskChannelClosed,
}

/// Errors returned by the resource pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Pool exhausted: all {max_size} slots are checked out")]
    Exhausted { max_size: usize },
    #[error("Timed out after {0:?} waiting for a pool slot")]
    AcquireTimedOut(Duration),
    #[error("Pool closed")]
    Closed,
    #[error("Resource creation failed: {0}")]
    Create(Box<dyn std::error::Error + Send + Sync>),
}

/// Errors returned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Scheduled task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("Scheduler shut down")]
    ShutDown,
    #[error("No scheduler attached to this actor")]
    Unavailable,
}

/// Errors observed by event bus subscribers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    #[error("Subscriber lagged behind by {0} events")]
    SubscriberLagged(u64),
    #[error("Event bus closed")]
    Closed,
}

/// Invalid runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Umbrella error for code that drives several components.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Actor(#[from] ActorError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Actor task failed: {0}")]
    ActorTaskFailed(String),
}
