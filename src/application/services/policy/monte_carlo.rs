use async_trait::async_trait;
use tracing::debug;

use super::{PolicyKind, StartPolicy};
use crate::domain::entities::QueueElement;
use crate::domain::value_objects::{Request, RequestConfig};

/// Policy for generation requests that read no input dataset.
///
/// Job counts would come from the request configuration alone; until the
/// generation parameters are mapped this policy emits no elements.
pub struct MonteCarloPolicy;

#[async_trait]
impl StartPolicy for MonteCarloPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::MonteCarlo
    }

    fn validate(&self, _request: &Request) -> bool {
        true
    }

    async fn split(&self, request: &Request, _config: &RequestConfig) -> Vec<QueueElement> {
        debug!("MonteCarlo policy produces no elements for {}", request.name);
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::request;

    #[tokio::test]
    async fn test_split_is_empty_not_an_error() {
        let policy = MonteCarloPolicy;
        let request = request("mc-1", "MonteCarlo", "assigned", "");
        assert!(policy.validate(&request));
        assert!(policy.split(&request, &RequestConfig::default()).await.is_empty());
    }
}
