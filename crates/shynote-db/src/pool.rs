//! Database connection pool management.
//!
//! Sync operations hold a connection for one short transaction each, so the
//! pool is sized by concurrent requests rather than by tenants. Operators tune
//! it through `SHYNOTE_DB_MAX_CONNECTIONS` and `SHYNOTE_DB_ACQUIRE_TIMEOUT_SECS`.

use std::env;
use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use shynote_core::{Error, Result};

/// Environment variable holding the PostgreSQL connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Environment variable overriding the pool's maximum connection count.
pub const ENV_MAX_CONNECTIONS: &str = "SHYNOTE_DB_MAX_CONNECTIONS";

/// Environment variable overriding how long a transaction waits for a connection.
pub const ENV_ACQUIRE_TIMEOUT_SECS: &str = "SHYNOTE_DB_ACQUIRE_TIMEOUT_SECS";

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Connections idle longer than this are closed.
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Connections are recycled after this long regardless of use.
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Pool sizing for the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    /// How long `begin` waits for a free connection before the operation
    /// fails as a store error.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from process environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_MAX_CONNECTIONS) {
            config.max_connections = parse_positive(ENV_MAX_CONNECTIONS, &raw)? as u32;
        }
        if let Some(raw) = lookup(ENV_ACQUIRE_TIMEOUT_SECS) {
            config.acquire_timeout =
                Duration::from_secs(parse_positive(ENV_ACQUIRE_TIMEOUT_SECS, &raw)?);
        }
        Ok(config)
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(u64::from(n)),
        _ => Err(Error::Config(format!(
            "{} must be a positive integer, got {:?}",
            key, raw
        ))),
    }
}

/// Read `DATABASE_URL`, failing with a configuration error when unset.
pub fn database_url_from_env() -> Result<String> {
    env::var(ENV_DATABASE_URL)
        .map_err(|_| Error::Config(format!("{} is not set", ENV_DATABASE_URL)))
}

/// Connect with the default pool sizing.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::default()).await
}

/// Connect with explicit pool sizing.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "database",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Record store pool ready"
    );
    Ok(pool)
}

/// Log pool occupancy; warns when every connection is checked out.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "database",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool occupancy"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "database",
            component = "pool",
            pool_size = size,
            "All pool connections are busy"
        );
    }
}
