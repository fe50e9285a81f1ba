//! Queue element store port - Durable storage for produced queue elements

use async_trait::async_trait;

use crate::domain::entities::QueueElement;
use crate::domain::value_objects::{ElementId, Revision};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Revision conflict on {id}: current revision is {current}")]
    Conflict { id: ElementId, current: Revision },
    #[error("Element not found: {0}")]
    NotFound(ElementId),
}

/// A queue element with its persisted identity and revision
#[derive(Debug, Clone, PartialEq)]
pub struct StoredElement {
    pub id: ElementId,
    pub rev: Revision,
    pub element: QueueElement,
}

#[async_trait]
pub trait QueueElementStorePort: Send + Sync {
    /// Persist every element of one request in a single batch
    async fn insert_batch(
        &self,
        elements: Vec<QueueElement>,
    ) -> Result<Vec<StoredElement>, StoreError>;

    /// Elements indexed by workflow; `None` lists every stored element
    async fn list_by_workflow(
        &self,
        request_name: Option<&str>,
    ) -> Result<Vec<StoredElement>, StoreError>;

    /// Delete an element; fails with `Conflict` when `rev` is not current
    async fn delete(&self, id: ElementId, rev: &Revision) -> Result<(), StoreError>;

    /// Number of distinct workflows with at least one stored element
    async fn count_workflows(&self) -> Result<usize, StoreError>;
}
