//! Storage backends for report persistence
//!
//! This module provides a trait-based abstraction over the report history and
//! the host registry.
//!
//! ## Design
//!
//! - **Trait-based**: `ReportStore` and `HostRegistry` let the pipeline run on any backend
//! - **Async**: All operations are async for compatibility with Tokio tasks
//! - **Parameterized**: SQL backends bind every value, nothing is interpolated
//!
//! ## Backends
//!
//! - **MySQL** (default): the shared database the agents' hub writes to
//! - **SQLite**: Embedded database, good for a single hub box
//! - **In-Memory**: No persistence, for testing
//!
//! ## Usage
//!
//! ```no_run
//! use hostmon::storage::{StorageBackend, sqlite::SqliteBackend};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = SqliteBackend::new("./hostmon.db").await?;
//!     // Hand to the Pipeline
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod mysql;
pub mod schema;
pub mod sqlite;

use std::sync::Arc;

pub use backend::{HealthStatus, HostRegistry, ReportStore, StorageBackend};
pub use error::{StorageError, StorageResult};

use crate::config::{DatabaseConfig, DbBackend};

/// Open the backend selected by the configuration
pub async fn open(config: &DatabaseConfig) -> StorageResult<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config.backend {
        DbBackend::MySql => Arc::new(mysql::MySqlBackend::connect(config).await?),
        DbBackend::Sqlite => Arc::new(sqlite::SqliteBackend::new(&config.name).await?),
        DbBackend::Memory => Arc::new(memory::MemoryBackend::new()),
    };

    Ok(backend)
}
