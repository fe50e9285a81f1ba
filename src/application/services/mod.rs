//! Application services - Use case implementations
//!
//! The request-to-queue-element pipeline: remote aggregation, block and site
//! resolution, start policies, and the job handler that drives them.

pub mod aggregator;
pub mod block_service;
pub mod data_services;
pub mod policy;
pub mod site_service;
pub mod workqueue_service;

pub use aggregator::{Aggregated, Aggregator};
pub use block_service::BlockResolver;
pub use policy::{PolicyKind, PolicyRegistry, StartPolicy};
pub use site_service::SiteResolver;
pub use workqueue_service::{CleanupOutcome, ProcessOutcome, WorkQueueService};
