//! Store configuration and the single-flight initialization context.

use crate::backend::StoreBackend;
use crate::embedded::EmbeddedStore;
use crate::error::{StoreError, StoreResult};
use crate::host::HostManagedStore;
use crate::memory::MemoryStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

/// Which storage backend to use, decided once at construction.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    /// File-backed embedded store in the given directory.
    Embedded {
        /// Store directory, created if missing.
        dir: PathBuf,
    },
    /// Host-provided SQLite database at the given path.
    HostManaged {
        /// Database file path.
        path: PathBuf,
    },
    /// In-memory store; nothing survives a restart.
    Memory,
}

impl StoreConfig {
    fn open(&self) -> StoreResult<Arc<dyn StoreBackend>> {
        match self {
            StoreConfig::Embedded { dir } => Ok(Arc::new(EmbeddedStore::open(dir)?)),
            StoreConfig::HostManaged { path } => Ok(Arc::new(HostManagedStore::open(path)?)),
            StoreConfig::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

/// Explicit context object carrying the lazily-initialized store.
///
/// Construction is cheap and infallible; the backend is opened on first
/// use. Concurrent callers before readiness all await the same
/// initialization rather than racing to open storage multiple times.
/// Consumers receive the context by injection, never through a global.
pub struct StoreContext {
    config: StoreConfig,
    cell: OnceCell<Arc<dyn StoreBackend>>,
}

impl StoreContext {
    /// Creates a context for the given backend configuration.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    /// Returns the initialized backend, opening it on first call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backing storage cannot
    /// be opened. A later call retries the initialization.
    pub async fn store(&self) -> StoreResult<Arc<dyn StoreBackend>> {
        let backend = self
            .cell
            .get_or_try_init(|| async {
                let backend = self
                    .config
                    .open()
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                info!("durable local store initialized");
                Ok::<_, StoreError>(backend)
            })
            .await?;
        Ok(Arc::clone(backend))
    }

    /// Returns the backend if initialization has already completed.
    pub fn store_if_ready(&self) -> Option<Arc<dyn StoreBackend>> {
        self.cell.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Collection, StoredRecord};
    use serde_json::json;

    #[tokio::test]
    async fn concurrent_callers_share_one_backend() {
        let context = Arc::new(StoreContext::new(StoreConfig::Memory));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let context = Arc::clone(&context);
            handles.push(tokio::spawn(async move { context.store().await.unwrap() }));
        }

        let mut backends = Vec::new();
        for handle in handles {
            backends.push(handle.await.unwrap());
        }
        for backend in &backends[1..] {
            assert!(Arc::ptr_eq(&backends[0], backend));
        }
    }

    #[tokio::test]
    async fn unopenable_storage_reports_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("not-a-directory");
        std::fs::write(&file_path, b"x").unwrap();

        let context = StoreContext::new(StoreConfig::Embedded { dir: file_path });
        assert!(matches!(
            context.store().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(context.store_if_ready().is_none());
    }

    #[tokio::test]
    async fn initialized_store_accepts_writes() {
        let context = StoreContext::new(StoreConfig::Memory);
        let store = context.store().await.unwrap();

        store
            .put(Collection::Vehicles, &StoredRecord::new("v1", json!({})))
            .unwrap();
        assert_eq!(store.count(Collection::Vehicles).unwrap(), 1);
        assert!(context.store_if_ready().is_some());
    }
}
