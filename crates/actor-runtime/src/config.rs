//! Runtime configuration.
//!
//! Every setting has a default; [`RuntimeConfig::from_env`] overrides them from the
//! process environment:
//!
//! | Variable                  | Field                  | Default |
//! |---------------------------|------------------------|---------|
//! | `ACTOR_MAILBOX_CAPACITY`  | `mailbox_capacity`     | 32      |
//! | `ACTOR_ASK_TIMEOUT_MS`    | `ask_timeout`          | 5000    |
//! | `BUS_CAPACITY`            | `bus.capacity`         | 64      |
//! | `BUS_OVERFLOW`            | `bus.policy`           | `backpressure` |
//! | `POOL_MAX_SIZE`           | `pool.max_size`        | 10      |
//! | `POOL_IDLE_TTL_MS`        | `pool.idle_ttl`        | 600000  |
//! | `POOL_ACQUIRE_TIMEOUT_MS` | `pool.acquire_timeout` | 30000 (`0` waits forever) |
//! | `POOL_SWEEP_INTERVAL_MS`  | `pool.sweep_interval`  | 30000   |

use crate::bus::{BusConfig, OverflowPolicy};
use crate::error::ConfigError;
use crate::pool::PoolConfig;
use std::str::FromStr;
use std::time::Duration;

/// Default mailbox buffer size
pub const MAILBOX_CAPACITY_DEFAULT: usize = 32;

/// Default ask timeout (5 seconds)
pub const ASK_TIMEOUT_DEFAULT: Duration = Duration::from_secs(5);

/// Configuration shared by everything an [`ActorSystem`](crate::ActorSystem) creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub mailbox_capacity: usize,
    pub ask_timeout: Duration,
    pub bus: BusConfig,
    pub pool: PoolConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: MAILBOX_CAPACITY_DEFAULT,
            ask_timeout: ASK_TIMEOUT_DEFAULT,
            bus: BusConfig::default(),
            pool: PoolConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = timeout;
        self
    }

    pub fn with_bus(mut self, bus: BusConfig) -> Self {
        self.bus = bus;
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "mailbox_capacity",
                reason: "must be greater than 0".to_string(),
            });
        }
        if self.ask_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "ask_timeout",
                reason: "must be non-zero".to_string(),
            });
        }
        self.bus.validate()?;
        self.pool.validate()
    }

    /// Defaults overridden by the process environment, then validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable, then validated.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, "ACTOR_MAILBOX_CAPACITY", "mailbox_capacity")? {
            config.mailbox_capacity = v;
        }
        if let Some(ms) = parse(&lookup, "ACTOR_ASK_TIMEOUT_MS", "ask_timeout")? {
            config.ask_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = parse(&lookup, "BUS_CAPACITY", "bus.capacity")? {
            config.bus.capacity = v;
        }
        if let Some(raw) = lookup("BUS_OVERFLOW") {
            config.bus.policy = OverflowPolicy::from_str(&raw)?;
        }
        if let Some(v) = parse(&lookup, "POOL_MAX_SIZE", "pool.max_size")? {
            config.pool.max_size = v;
        }
        if let Some(ms) = parse(&lookup, "POOL_IDLE_TTL_MS", "pool.idle_ttl")? {
            config.pool.idle_ttl = Duration::from_millis(ms);
        }
        let acquire_timeout_ms =
            parse::<u64, _>(&lookup, "POOL_ACQUIRE_TIMEOUT_MS", "pool.acquire_timeout")?;
        if let Some(ms) = acquire_timeout_ms {
            config.pool.acquire_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse(&lookup, "POOL_SWEEP_INTERVAL_MS", "pool.sweep_interval")? {
            config.pool.sweep_interval = Duration::from_millis(ms);
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse<T, F>(lookup: &F, key: &str, field: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse()
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            field,
            reason: format!("{key}={raw}: {e}"),
        })
}
