//! # shynote-db
//!
//! PostgreSQL record store for shynote.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgRecordStore`], the PostgreSQL implementation of the sync engine's
//!   record store traits
//! - Embedded schema migrations
//!
//! ## Example
//!
//! ```rust,ignore
//! use shynote_db::{Database, NewNote, SyncConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/shynote").await?;
//!     let engine = db.engine(SyncConfig::from_env()?);
//!
//!     let note = engine.create_or_get_note("alice", NewNote {
//!         id: "c1b2-offline-0001".to_string(),
//!         title: "Groceries".to_string(),
//!         ..Default::default()
//!     }).await?;
//!
//!     println!("Note {} at version {}", note.id, note.version);
//!     Ok(())
//! }
//! ```
pub mod pool;
pub mod store;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use shynote_core::*;

pub use pool::{
    create_pool, create_pool_with_config, database_url_from_env, log_pool_metrics, PoolConfig,
};
pub use store::{PgRecordStore, PgStoreTx};

/// Database handle: the connection pool and the record store built on it.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Record store for the sync engine.
    pub store: PgRecordStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            store: PgRecordStore::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// A sync engine running on this database.
    pub fn engine(&self, config: SyncConfig) -> SyncEngine<PgRecordStore> {
        SyncEngine::new(self.store.clone(), config)
    }
}
