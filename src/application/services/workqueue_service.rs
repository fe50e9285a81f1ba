//! WorkQueue Service - Turns requests into persisted queue elements
//!
//! Implements the two job kinds a worker can receive: processing a newly
//! approved request and reclaiming an element whose workflow has closed.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::application::dto::Job;
use crate::application::ports::inbound::JobHandler;
use crate::application::ports::outbound::{
    QueueElementStorePort, StoredElement, WorkflowManagerPort,
};
use crate::application::services::policy::PolicyRegistry;
use crate::domain::value_objects::Request;

/// What became of a processed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Queued(usize),
    AlreadyQueued,
    UnknownType,
    Invalid,
    NothingToQueue,
}

/// What became of a reclaimed element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted,
    StillActive,
    RequestGone,
}

pub struct WorkQueueService {
    workflow_manager: Arc<dyn WorkflowManagerPort>,
    store: Arc<dyn QueueElementStorePort>,
    policies: Arc<PolicyRegistry>,
    reclaim_status: String,
}

impl WorkQueueService {
    pub fn new(
        workflow_manager: Arc<dyn WorkflowManagerPort>,
        store: Arc<dyn QueueElementStorePort>,
        policies: Arc<PolicyRegistry>,
        reclaim_status: impl Into<String>,
    ) -> Self {
        Self {
            workflow_manager,
            store,
            policies,
            reclaim_status: reclaim_status.into(),
        }
    }

    /// Split a request with its policy and persist the elements in one batch
    #[instrument(skip(self, request), fields(request = %request.name))]
    pub async fn process(&self, request: &Request) -> Result<ProcessOutcome> {
        let Some(policy) = self.policies.for_request(request) else {
            warn!("No start policy for request type '{}'", request.request_type);
            return Ok(ProcessOutcome::UnknownType);
        };
        if !policy.validate(request) {
            warn!("Request rejected by {} policy", policy.kind());
            return Ok(ProcessOutcome::Invalid);
        }

        let existing = self
            .store
            .list_by_workflow(Some(&request.name))
            .await
            .context("Failed to check for queued elements")?;
        if !existing.is_empty() {
            debug!("{} elements already queued, skipping", existing.len());
            return Ok(ProcessOutcome::AlreadyQueued);
        }

        let config = self
            .workflow_manager
            .request_config(&request.name)
            .await
            .context("Failed to fetch request configuration")?;

        let elements = policy.split(request, &config).await;
        if elements.is_empty() {
            info!("{} policy produced no elements", policy.kind());
            return Ok(ProcessOutcome::NothingToQueue);
        }

        let stored = self
            .store
            .insert_batch(elements)
            .await
            .context("Failed to persist queue elements")?;
        info!("Queued {} elements", stored.len());
        Ok(ProcessOutcome::Queued(stored.len()))
    }

    /// Delete an element once its workflow reached the reclaim status
    #[instrument(skip(self, stored), fields(request = %stored.element.request_name, id = %stored.id))]
    pub async fn cleanup(&self, stored: &StoredElement) -> Result<CleanupOutcome> {
        let request_name = &stored.element.request_name;
        let live = self
            .workflow_manager
            .request(request_name)
            .await
            .context("Failed to fetch live request")?;

        let Some(live) = live else {
            warn!("Request no longer known to the workflow manager, keeping element");
            return Ok(CleanupOutcome::RequestGone);
        };
        if live.status != self.reclaim_status {
            debug!("Request is '{}', keeping element", live.status);
            return Ok(CleanupOutcome::StillActive);
        }

        self.store
            .delete(stored.id, &stored.rev)
            .await
            .context("Failed to delete queue element")?;
        info!("Reclaimed element of {} request", live.status);
        Ok(CleanupOutcome::Deleted)
    }
}

#[async_trait]
impl JobHandler for WorkQueueService {
    async fn handle(&self, job: Job) -> Result<()> {
        match job {
            Job::Process(request) => self.process(&request).await.map(|_| ()),
            Job::Cleanup(stored) => self.cleanup(&stored).await.map(|_| ()),
        }
    }
}
