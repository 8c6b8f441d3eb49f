//! Shared state of the engine
//!
//! The server directory, the monitoring registry and the stats cache are the
//! only state shared between the prober and the polling loops. Two backends
//! implement all three:
//!
//! - **SQLite** (default): one database file, usable by several engine
//!   processes at once
//! - **In-Memory**: single process only, for tests and ephemeral runs
//!
//! ## Usage
//!
//! ```no_run
//! use montool::config::StorageConfig;
//! use montool::storage;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let stores = storage::open(&StorageConfig::default()).await?;
//!     let servers = stores.directory.list_servers().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::info;

pub mod backend;
pub mod error;
pub mod memory;
#[cfg(feature = "storage-sqlite")]
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{MonitoringRegistry, RegistryToken, ServerDirectory, StatsCache};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;

use crate::config::StorageConfig;

/// The three stores as used by the engine.
#[derive(Clone)]
pub struct Stores {
    pub directory: Arc<dyn ServerDirectory>,
    pub registry: Arc<dyn MonitoringRegistry>,
    pub cache: Arc<dyn StatsCache>,
}

impl Stores {
    /// Use one backend for all three stores.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ServerDirectory + MonitoringRegistry + StatsCache + 'static,
    {
        Self {
            directory: backend.clone(),
            registry: backend.clone(),
            cache: backend,
        }
    }
}

/// Open the backend selected in the configuration.
pub async fn open(config: &StorageConfig) -> StorageResult<Stores> {
    match config {
        StorageConfig::None => {
            info!("using in-memory storage, state is lost on restart");
            Ok(Stores::from_backend(Arc::new(MemoryBackend::new())))
        }
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let backend = sqlite::SqliteBackend::new(path).await?;
            Ok(Stores::from_backend(Arc::new(backend)))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => Err(StorageError::ConnectionFailed(
            "built without the storage-sqlite feature".to_string(),
        )),
    }
}
