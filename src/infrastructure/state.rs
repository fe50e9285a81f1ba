//! Shared application state

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::application::ports::outbound::{
    QueueElementStorePort, RemoteCallerPort, WorkflowManagerPort,
};
use crate::application::services::{
    Aggregator, BlockResolver, PolicyRegistry, SiteResolver, WorkQueueService,
};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::dispatcher::{DispatchSettings, Dispatcher};
use crate::infrastructure::http_client::{RemoteCaller, RetryPolicy};
use crate::infrastructure::persistence::create_element_store;
use crate::infrastructure::reqmgr::ReqMgrClient;
use crate::infrastructure::worker_pool::{JobMetrics, WorkerPool};

/// Shared application state, created once at startup and read-only afterwards
pub struct AppState {
    pub config: AppConfig,
    pub workflow_manager: Arc<dyn WorkflowManagerPort>,
    pub store: Arc<dyn QueueElementStorePort>,
    pub metrics: Arc<JobMetrics>,
    pub pool: Arc<WorkerPool>,
    pub dispatcher: Arc<Dispatcher>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let caller: Arc<dyn RemoteCallerPort> = Arc::new(RemoteCaller::new(
            RetryPolicy::new(config.retry_backoff()),
            config.verbose,
        ));
        let workflow_manager = Arc::new(ReqMgrClient::new(caller.clone(), &config.reqmgr_url));
        let store = Arc::new(create_element_store(&config).await?);

        Ok(Self::assemble(config, caller, workflow_manager, store))
    }

    /// Wire services, workers and dispatcher around the given adapters
    pub fn assemble(
        config: AppConfig,
        caller: Arc<dyn RemoteCallerPort>,
        workflow_manager: Arc<dyn WorkflowManagerPort>,
        store: Arc<dyn QueueElementStorePort>,
    ) -> Self {
        let aggregator = Aggregator::new(caller);
        let policies = PolicyRegistry::new(
            BlockResolver::new(aggregator.clone(), config.dbs_url.clone()),
            SiteResolver::new(aggregator, config.phedex_url.clone()),
        );
        let service = Arc::new(WorkQueueService::new(
            workflow_manager.clone(),
            store.clone(),
            Arc::new(policies),
            config.reclaim_status.clone(),
        ));

        let metrics = Arc::new(JobMetrics::new());
        let pool = Arc::new(WorkerPool::start(config.workers, service, metrics.clone()));
        let dispatcher = Arc::new(Dispatcher::new(
            workflow_manager.clone(),
            store.clone(),
            pool.clone(),
            DispatchSettings::from(&config),
        ));

        Self {
            config,
            workflow_manager,
            store,
            metrics,
            pool,
            dispatcher,
            started_at: Utc::now(),
        }
    }
}
