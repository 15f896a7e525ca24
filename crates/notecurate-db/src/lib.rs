//! # notecurate-db
//!
//! SQLite database layer for notecurate.
//!
//! This crate provides:
//! - Connection pool management
//! - Embedded schema migrations
//! - Repository implementations for raw notes, structured notes and the
//!   links between them
//!
//! ## Example
//!
//! ```rust,ignore
//! use notecurate_db::{Database, RawNoteRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("sqlite://notecurate.db").await?;
//!     db.migrate().await?;
//!
//!     let ids = db.raw_notes.insert_many(vec!["Road 450 closed".to_string()]).await?;
//!     println!("Saved raw notes: {:?}", ids);
//!     Ok(())
//! }
//! ```

pub mod notes;
pub mod pool;
pub mod raw_notes;

// Re-export core types
pub use notecurate_core::*;

pub use notes::SqliteNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use raw_notes::SqliteRawNoteRepository;

use sqlx::SqlitePool;
use tracing::info;

/// Combined database context with all repositories.
#[derive(Debug, Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: SqlitePool,
    /// Raw note repository.
    pub raw_notes: SqliteRawNoteRepository,
    /// Structured note repository, including raw-note links.
    pub notes: SqliteNoteRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            raw_notes: SqliteRawNoteRepository::new(pool.clone()),
            notes: SqliteNoteRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database with migrations applied.
    pub async fn connect_in_memory() -> Result<Self> {
        let db = Self::connect_with_config(pool::IN_MEMORY_URL, PoolConfig::in_memory()).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        info!(
            subsystem = "database",
            component = "migrations",
            op = "migrate",
            "Migrations applied"
        );
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
