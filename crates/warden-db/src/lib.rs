//! # warden-db
//!
//! Storage layer for warden.
//!
//! This crate provides:
//! - Connection pool management
//! - [`PgTokenStore`], the PostgreSQL implementation of `TokenStore`
//! - [`InMemoryTokenStore`] for tests and single-process deployments
//! - Schema migrations (feature `migrations`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use warden_db::Database;
//! use warden_core::TokenStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/warden").await?;
//!     db.migrate().await?;
//!     let client = db.store.get_client("wd_example").await?;
//!     Ok(())
//! }
//! ```

pub mod memory;
pub mod oauth;
pub mod pool;

#[cfg(feature = "migrations")]
pub mod test_fixtures;

pub use memory::InMemoryTokenStore;
pub use oauth::PgTokenStore;
pub use pool::{
    create_pool, create_pool_with_config, create_pool_with_connect_options, log_pool_metrics,
    PoolConfig,
};

// Re-export core types for convenience
pub use warden_core::{Error, Result, TokenStore};

/// Database context: the pool plus the store built on it.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Token store backed by `pool`.
    pub store: PgTokenStore,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            store: PgTokenStore::new(pool.clone()),
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
}
