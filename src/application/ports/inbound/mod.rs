//! Inbound ports - Interfaces that the application exposes to the outside world

use async_trait::async_trait;

use crate::application::dto::Job;

/// Executes one job handed over by a worker.
///
/// An error is reported back to the worker for logging and counting; it
/// never takes the worker down.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: Job) -> anyhow::Result<()>;
}
