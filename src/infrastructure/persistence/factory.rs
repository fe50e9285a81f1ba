//! Store factory - Creates the element store selected by configuration

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::application::ports::outbound::{QueueElementStorePort, StoreError, StoredElement};
use crate::domain::entities::QueueElement;
use crate::domain::value_objects::{ElementId, Revision};
use crate::infrastructure::config::{AppConfig, StoreBackend};
use crate::infrastructure::persistence::{MemoryElementStore, SqliteElementStore};

/// Enum wrapper for store backends to enable runtime selection
pub enum ElementStoreBackend {
    Memory(MemoryElementStore),
    Sqlite(SqliteElementStore),
}

#[async_trait]
impl QueueElementStorePort for ElementStoreBackend {
    async fn insert_batch(
        &self,
        elements: Vec<QueueElement>,
    ) -> Result<Vec<StoredElement>, StoreError> {
        match self {
            ElementStoreBackend::Memory(s) => s.insert_batch(elements).await,
            ElementStoreBackend::Sqlite(s) => s.insert_batch(elements).await,
        }
    }

    async fn list_by_workflow(
        &self,
        request_name: Option<&str>,
    ) -> Result<Vec<StoredElement>, StoreError> {
        match self {
            ElementStoreBackend::Memory(s) => s.list_by_workflow(request_name).await,
            ElementStoreBackend::Sqlite(s) => s.list_by_workflow(request_name).await,
        }
    }

    async fn delete(&self, id: ElementId, rev: &Revision) -> Result<(), StoreError> {
        match self {
            ElementStoreBackend::Memory(s) => s.delete(id, rev).await,
            ElementStoreBackend::Sqlite(s) => s.delete(id, rev).await,
        }
    }

    async fn count_workflows(&self) -> Result<usize, StoreError> {
        match self {
            ElementStoreBackend::Memory(s) => s.count_workflows().await,
            ElementStoreBackend::Sqlite(s) => s.count_workflows().await,
        }
    }
}

/// Build the configured store; failing to open the database is fatal at startup
pub async fn create_element_store(config: &AppConfig) -> Result<ElementStoreBackend> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory element store");
            Ok(ElementStoreBackend::Memory(MemoryElementStore::new()))
        }
        StoreBackend::Sqlite => {
            tracing::info!("Using SQLite element store at {}", config.sqlite_path);
            let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.sqlite_path))
                .context("Invalid SQLite path")?
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await
                .context("Failed to open SQLite element store")?;
            let store = SqliteElementStore::new(pool)
                .await
                .context("Failed to prepare element table")?;
            Ok(ElementStoreBackend::Sqlite(store))
        }
    }
}
