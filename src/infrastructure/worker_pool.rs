//! Bounded worker pool
//!
//! N long-lived workers. Before waiting for a job each worker registers its
//! private job slot in a shared queue of idle slots; a submitter takes exactly
//! one slot from that queue (waiting while none is free) and sends the job
//! into it. After the job the worker registers again.
//!
//! Workers check the stop signal between jobs; a job in progress always runs
//! to completion.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::application::dto::Job;
use crate::application::ports::inbound::JobHandler;

/// Job counters shared by every worker
#[derive(Debug, Default)]
pub struct JobMetrics {
    jobs: AtomicU64,
    active: AtomicUsize,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub jobs: u64,
    pub active: usize,
    pub failed: u64,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn job_started(&self) {
        self.jobs.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    fn job_finished(&self, succeeded: bool) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        if !succeeded {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs: self.jobs.load(Ordering::SeqCst),
            active: self.active.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("worker pool is shut down")]
pub struct PoolClosed;

struct Assignment {
    job: Job,
    /// Receives whether the job succeeded
    done: oneshot::Sender<bool>,
}

type Slot = mpsc::Sender<Assignment>;

pub struct WorkerPool {
    idle: Mutex<mpsc::Receiver<Slot>>,
    stop: watch::Sender<bool>,
    metrics: Arc<JobMetrics>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    size: usize,
}

impl WorkerPool {
    /// Spawn `size` workers running jobs through `handler`
    pub fn start(size: usize, handler: Arc<dyn JobHandler>, metrics: Arc<JobMetrics>) -> Self {
        let (idle_tx, idle_rx) = mpsc::channel(size.max(1));
        let (stop_tx, stop_rx) = watch::channel(false);

        let workers = (0..size)
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    handler.clone(),
                    idle_tx.clone(),
                    stop_rx.clone(),
                    metrics.clone(),
                ))
            })
            .collect();
        info!("Started {} workers", size);

        Self {
            idle: Mutex::new(idle_rx),
            stop: stop_tx,
            metrics,
            workers: Mutex::new(workers),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn metrics(&self) -> &Arc<JobMetrics> {
        &self.metrics
    }

    /// Wait for an idle worker and hand it the job.
    ///
    /// The returned receiver resolves once the job has finished, with
    /// `true` when it succeeded.
    pub async fn submit(&self, job: Job) -> Result<oneshot::Receiver<bool>, PoolClosed> {
        let (done_tx, done_rx) = oneshot::channel();
        let mut assignment = Assignment { job, done: done_tx };
        loop {
            let slot = {
                let mut idle = self.idle.lock().await;
                idle.recv().await.ok_or(PoolClosed)?
            };
            // A slot left behind by a worker that has since stopped
            match slot.send(assignment).await {
                Ok(()) => return Ok(done_rx),
                Err(mpsc::error::SendError(returned)) => assignment = returned,
            }
        }
    }

    /// Signal every worker to stop and wait for them to finish their current job
    pub async fn shutdown(&self) {
        let _ = self.stop.send(true);
        let workers = std::mem::take(&mut *self.workers.lock().await);
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker ended abnormally: {}", e);
            }
        }
        info!("All workers stopped");
    }
}

async fn run_worker(
    id: usize,
    handler: Arc<dyn JobHandler>,
    idle: mpsc::Sender<Slot>,
    mut stop: watch::Receiver<bool>,
    metrics: Arc<JobMetrics>,
) {
    let (slot_tx, mut slot_rx) = mpsc::channel::<Assignment>(1);
    loop {
        if *stop.borrow() {
            break;
        }
        if idle.send(slot_tx.clone()).await.is_err() {
            break;
        }

        let assignment = tokio::select! {
            biased;
            assignment = slot_rx.recv() => match assignment {
                Some(assignment) => assignment,
                None => break,
            },
            _ = stop.changed() => break,
        };
        run_job(id, handler.as_ref(), &metrics, assignment).await;
    }

    // A submitter may have filled the slot just as the stop signal arrived
    slot_rx.close();
    while let Ok(assignment) = slot_rx.try_recv() {
        run_job(id, handler.as_ref(), &metrics, assignment).await;
    }
    debug!("Worker {} stopped", id);
}

async fn run_job(id: usize, handler: &dyn JobHandler, metrics: &JobMetrics, assignment: Assignment) {
    let kind = assignment.job.kind();
    let name = assignment.job.request_name().to_string();
    debug!("Worker {} running {} job for {}", id, kind, name);

    metrics.job_started();
    let succeeded = match handler.handle(assignment.job).await {
        Ok(()) => true,
        Err(e) => {
            error!("Worker {}: {} job for {} failed: {:#}", id, kind, name, e);
            false
        }
    };
    metrics.job_finished(succeeded);
    let _ = assignment.done.send(succeeded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::request;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Handler that blocks each job until a permit is released
    struct GatedHandler {
        gate: Arc<Semaphore>,
        started: std::sync::Mutex<Vec<String>>,
        handled: std::sync::Mutex<Vec<String>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    impl GatedHandler {
        fn new(gate: Arc<Semaphore>) -> Self {
            Self {
                gate,
                started: std::sync::Mutex::new(Vec::new()),
                handled: std::sync::Mutex::new(Vec::new()),
                running: AtomicUsize::new(0),
                max_running: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl JobHandler for GatedHandler {
        async fn handle(&self, job: Job) -> anyhow::Result<()> {
            self.started.lock().unwrap().push(job.request_name().to_string());
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            self.gate.acquire().await.unwrap().forget();
            self.running.fetch_sub(1, Ordering::SeqCst);

            let name = job.request_name().to_string();
            self.handled.lock().unwrap().push(name.clone());
            if name.starts_with("bad") {
                anyhow::bail!("cannot handle {}", name);
            }
            Ok(())
        }
    }

    fn job(name: &str) -> Job {
        Job::Process(request(name, "ReReco", "assigned", "/A/B/RAW"))
    }

    #[tokio::test]
    async fn test_submit_blocks_until_a_worker_is_free() {
        let gate = Arc::new(Semaphore::new(0));
        let handler = Arc::new(GatedHandler::new(gate.clone()));
        let pool = WorkerPool::start(1, handler.clone(), Arc::new(JobMetrics::new()));

        let first = pool.submit(job("req-1")).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), pool.submit(job("req-2"))).await;
        assert!(blocked.is_err());

        gate.add_permits(1);
        assert!(first.await.unwrap());

        let second = pool.submit(job("req-2")).await.unwrap();
        gate.add_permits(1);
        assert!(second.await.unwrap());
        assert_eq!(*handler.handled.lock().unwrap(), vec!["req-1", "req-2"]);
    }

    #[tokio::test]
    async fn test_concurrent_submits_wait_for_the_worker_to_register_again() {
        let gate = Arc::new(Semaphore::new(0));
        let handler = Arc::new(GatedHandler::new(gate.clone()));
        let pool = Arc::new(WorkerPool::start(1, handler.clone(), Arc::new(JobMetrics::new())));

        let submitters: Vec<_> = ["req-a", "req-b"]
            .into_iter()
            .map(|name| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.submit(job(name)).await.unwrap() })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // One job delivered, the other submitter still waits for a free slot
        let (delivered, waiting): (Vec<_>, Vec<_>) =
            submitters.into_iter().partition(|submitter| submitter.is_finished());
        assert_eq!(delivered.len(), 1);
        assert_eq!(waiting.len(), 1);
        assert_eq!(handler.started.lock().unwrap().len(), 1);

        gate.add_permits(1);
        let first = delivered.into_iter().next().unwrap().await.unwrap();
        assert!(first.await.unwrap());

        let second = waiting.into_iter().next().unwrap().await.unwrap();
        gate.add_permits(1);
        assert!(second.await.unwrap());

        let started = handler.started.lock().unwrap().clone();
        assert_eq!(started.len(), 2);
        assert_eq!(*handler.handled.lock().unwrap(), started);
        assert_eq!(handler.max_running.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_worker_runs_job_handed_over_while_stopping() {
        let handler = Arc::new(GatedHandler::new(Arc::new(Semaphore::new(1))));
        let metrics = Arc::new(JobMetrics::new());
        let (idle_tx, mut idle_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(0, handler.clone(), idle_tx, stop_rx, metrics.clone()));

        let slot = idle_rx.recv().await.unwrap();
        let (done_tx, done_rx) = oneshot::channel();
        slot.try_send(Assignment { job: job("req-1"), done: done_tx }).unwrap();
        stop_tx.send(true).unwrap();

        assert!(done_rx.await.unwrap());
        worker.await.unwrap();
        assert_eq!(*handler.handled.lock().unwrap(), vec!["req-1"]);
        assert_eq!(metrics.snapshot().jobs, 1);
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_pool_size() {
        let gate = Arc::new(Semaphore::new(0));
        let handler = Arc::new(GatedHandler::new(gate.clone()));
        let pool = Arc::new(WorkerPool::start(3, handler.clone(), Arc::new(JobMetrics::new())));

        let submitters: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.submit(job(&format!("req-{}", i))).await.unwrap().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pool.metrics().snapshot().active, 3);

        gate.add_permits(8);
        for submitter in submitters {
            assert!(submitter.await.unwrap().unwrap());
        }
        assert_eq!(handler.max_running.load(Ordering::SeqCst), 3);
        assert_eq!(handler.handled.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_metrics_count_jobs_and_failures() {
        let gate = Arc::new(Semaphore::new(10));
        let handler = Arc::new(GatedHandler::new(gate));
        let pool = WorkerPool::start(2, handler, Arc::new(JobMetrics::new()));

        assert!(pool.submit(job("req-1")).await.unwrap().await.unwrap());
        assert!(!pool.submit(job("bad-1")).await.unwrap().await.unwrap());
        assert!(pool.submit(job("req-2")).await.unwrap().await.unwrap());

        let metrics = pool.metrics().snapshot();
        assert_eq!(metrics.jobs, 3);
        assert_eq!(metrics.failed, 1);
        assert_eq!(metrics.active, 0);
    }

    #[tokio::test]
    async fn test_shutdown_lets_running_job_finish() {
        let gate = Arc::new(Semaphore::new(0));
        let handler = Arc::new(GatedHandler::new(gate.clone()));
        let pool = Arc::new(WorkerPool::start(2, handler.clone(), Arc::new(JobMetrics::new())));

        let running = pool.submit(job("req-1")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let stopping = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.shutdown().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stopping.is_finished());

        gate.add_permits(1);
        assert!(running.await.unwrap());
        stopping.await.unwrap();

        assert!(matches!(pool.submit(job("req-2")).await, Err(PoolClosed)));
        assert_eq!(*handler.handled.lock().unwrap(), vec!["req-1"]);
    }
}
