//! Start policies - Translate one request into queue elements
//!
//! Each request type is served by one policy, chosen through an explicit
//! lookup table. Policies keep no state between calls.

mod block;
mod monte_carlo;
mod resubmit_block;

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::services::block_service::BlockResolver;
use crate::application::services::site_service::SiteResolver;
use crate::domain::entities::QueueElement;
use crate::domain::value_objects::{Request, RequestConfig};

pub use block::BlockPolicy;
pub use monte_carlo::MonteCarloPolicy;
pub use resubmit_block::ResubmitBlockPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyKind {
    Block,
    MonteCarlo,
    ResubmitBlock,
}

/// Request type to start policy
const REQUEST_TYPE_POLICIES: [(&str, PolicyKind); 7] = [
    ("ReReco", PolicyKind::Block),
    ("DQMHarvest", PolicyKind::Block),
    ("StoreResults", PolicyKind::Block),
    ("TaskChain", PolicyKind::Block),
    ("StepChain", PolicyKind::Block),
    ("MonteCarlo", PolicyKind::MonteCarlo),
    ("Resubmission", PolicyKind::ResubmitBlock),
];

impl PolicyKind {
    pub fn for_request_type(request_type: &str) -> Option<Self> {
        REQUEST_TYPE_POLICIES
            .iter()
            .find(|(name, _)| *name == request_type)
            .map(|(_, kind)| *kind)
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Block => f.write_str("Block"),
            Self::MonteCarlo => f.write_str("MonteCarlo"),
            Self::ResubmitBlock => f.write_str("ResubmitBlock"),
        }
    }
}

#[async_trait]
pub trait StartPolicy: Send + Sync {
    fn kind(&self) -> PolicyKind;

    /// Cheap structural check, no remote calls
    fn validate(&self, request: &Request) -> bool;

    /// Produce the queue elements for a request. Resolution problems are
    /// logged and yield fewer (possibly zero) elements, never an error.
    async fn split(&self, request: &Request, config: &RequestConfig) -> Vec<QueueElement>;
}

/// Policy instances keyed by kind
pub struct PolicyRegistry {
    block: Arc<BlockPolicy>,
    monte_carlo: Arc<MonteCarloPolicy>,
    resubmit_block: Arc<ResubmitBlockPolicy>,
}

impl PolicyRegistry {
    pub fn new(blocks: BlockResolver, sites: SiteResolver) -> Self {
        Self {
            block: Arc::new(BlockPolicy::new(blocks, sites)),
            monte_carlo: Arc::new(MonteCarloPolicy),
            resubmit_block: Arc::new(ResubmitBlockPolicy),
        }
    }

    pub fn get(&self, kind: PolicyKind) -> Arc<dyn StartPolicy> {
        match kind {
            PolicyKind::Block => self.block.clone(),
            PolicyKind::MonteCarlo => self.monte_carlo.clone(),
            PolicyKind::ResubmitBlock => self.resubmit_block.clone(),
        }
    }

    /// Policy serving the request's type, if the type is known
    pub fn for_request(&self, request: &Request) -> Option<Arc<dyn StartPolicy>> {
        PolicyKind::for_request_type(&request.request_type).map(|kind| self.get(kind))
    }
}
