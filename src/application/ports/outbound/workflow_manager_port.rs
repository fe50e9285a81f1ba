use async_trait::async_trait;

use super::RemoteError;
use crate::domain::value_objects::{Request, RequestConfig};

#[derive(Debug, thiserror::Error)]
pub enum WorkflowManagerError {
    #[error("Workflow manager call failed: {0}")]
    Remote(#[from] RemoteError),
    #[error("Unexpected workflow manager payload: {0}")]
    Decode(String),
}

/// Port to the workflow manager that owns request records
#[async_trait]
pub trait WorkflowManagerPort: Send + Sync {
    /// Requests currently in the given status
    async fn requests_by_status(&self, status: &str) -> Result<Vec<Request>, WorkflowManagerError>;

    /// Live record of a single request
    async fn request(&self, name: &str) -> Result<Option<Request>, WorkflowManagerError>;

    /// Configuration attached to a request
    async fn request_config(&self, name: &str) -> Result<RequestConfig, WorkflowManagerError>;
}
