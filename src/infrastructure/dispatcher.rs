//! Dispatch engine - Intake and reclaim schedules feeding the worker pool
//!
//! Every poll starts one short-lived task per item. The task waits for a
//! free worker, hands over its job and waits for the job to finish so the
//! item leaves the in-flight set.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::application::dto::Job;
use crate::application::ports::outbound::{QueueElementStorePort, WorkflowManagerPort};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::worker_pool::WorkerPool;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub request_status: String,
    pub queue_size: usize,
    pub fetch_interval: Duration,
    pub cleanup_interval: Duration,
}

impl From<&AppConfig> for DispatchSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            request_status: config.request_status.clone(),
            queue_size: config.queue_size,
            fetch_interval: config.fetch_interval(),
            cleanup_interval: config.cleanup_interval(),
        }
    }
}

type InFlight = Arc<Mutex<HashSet<String>>>;

pub struct Dispatcher {
    workflow_manager: Arc<dyn WorkflowManagerPort>,
    store: Arc<dyn QueueElementStorePort>,
    pool: Arc<WorkerPool>,
    settings: DispatchSettings,
    /// Request names with a process job not yet finished
    in_flight: InFlight,
    /// Element ids with a cleanup job not yet finished
    reclaiming: InFlight,
}

impl Dispatcher {
    pub fn new(
        workflow_manager: Arc<dyn WorkflowManagerPort>,
        store: Arc<dyn QueueElementStorePort>,
        pool: Arc<WorkerPool>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            workflow_manager,
            store,
            pool,
            settings,
            in_flight: InFlight::default(),
            reclaiming: InFlight::default(),
        }
    }

    /// Run both schedules until `shutdown` flips.
    ///
    /// Intake and reclaim tick on their own intervals; a slow poll on one
    /// side never delays the other. A poll still waiting on a remote
    /// service is abandoned when shutdown arrives.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(
            "Dispatcher running: intake every {:?} for '{}' requests, reclaim every {:?}",
            self.settings.fetch_interval, self.settings.request_status, self.settings.cleanup_interval
        );
        tokio::join!(
            schedule("Intake", self.settings.fetch_interval, shutdown.clone(), || self.intake_once()),
            schedule("Reclaim", self.settings.cleanup_interval, shutdown, || self.reclaim_once()),
        );
        info!("Dispatcher stopped");
    }

    /// Poll the workflow manager once and dispatch a process job per new request
    pub async fn intake_once(&self) -> Vec<JoinHandle<()>> {
        let requests = match self
            .workflow_manager
            .requests_by_status(&self.settings.request_status)
            .await
        {
            Ok(requests) => requests,
            Err(e) => {
                error!("Intake poll failed: {}", e);
                return Vec::new();
            }
        };

        let total = requests.len();
        let mut dispatched = Vec::new();
        let mut in_flight = self.in_flight.lock().await;
        for request in requests {
            if in_flight.contains(&request.name) {
                debug!("{} is still in flight", request.name);
                continue;
            }
            if in_flight.len() >= self.settings.queue_size {
                info!(
                    "Queue full ({} in flight), deferring the rest of {} requests",
                    in_flight.len(),
                    total
                );
                break;
            }
            in_flight.insert(request.name.clone());
            let key = request.name.clone();
            dispatched.push(self.spawn_dispatch(Job::Process(request), key, self.in_flight.clone()));
        }
        dispatched
    }

    /// List persisted elements once and dispatch a cleanup job per element
    pub async fn reclaim_once(&self) -> Vec<JoinHandle<()>> {
        let elements = match self.store.list_by_workflow(None).await {
            Ok(elements) => elements,
            Err(e) => {
                error!("Reclaim poll failed: {}", e);
                return Vec::new();
            }
        };

        let mut dispatched = Vec::new();
        let mut reclaiming = self.reclaiming.lock().await;
        for stored in elements {
            let key = stored.id.to_string();
            if !reclaiming.insert(key.clone()) {
                continue;
            }
            dispatched.push(self.spawn_dispatch(Job::Cleanup(stored), key, self.reclaiming.clone()));
        }
        dispatched
    }

    fn spawn_dispatch(&self, job: Job, key: String, in_flight: InFlight) -> JoinHandle<()> {
        let pool = self.pool.clone();
        tokio::spawn(async move {
            let kind = job.kind();
            match pool.submit(job).await {
                Ok(done) => {
                    let _ = done.await;
                }
                Err(e) => warn!("Dropping {} job for {}: {}", kind, key, e),
            }
            in_flight.lock().await.remove(&key);
        })
    }
}

async fn schedule<F, Fut>(
    name: &str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    poll: F,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = Vec<JoinHandle<()>>>,
{
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            dispatched = poll() => debug!("{} dispatched {} jobs", name, dispatched.len()),
        }
    }
    debug!("{} schedule stopped", name);
}
