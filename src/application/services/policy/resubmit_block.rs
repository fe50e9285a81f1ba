use async_trait::async_trait;
use tracing::debug;

use super::{PolicyKind, StartPolicy};
use crate::domain::entities::QueueElement;
use crate::domain::value_objects::{Request, RequestConfig};

/// Policy for resubmissions, which reuse the blocks recorded against the
/// original request instead of resolving them again.
///
/// The recorded blocks are not available to this service yet, so no
/// elements are produced.
pub struct ResubmitBlockPolicy;

#[async_trait]
impl StartPolicy for ResubmitBlockPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::ResubmitBlock
    }

    fn validate(&self, _request: &Request) -> bool {
        true
    }

    async fn split(&self, request: &Request, _config: &RequestConfig) -> Vec<QueueElement> {
        debug!(
            "ResubmitBlock policy produces no elements for {} (original request '{}')",
            request.name, request.original_request
        );
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::request;

    #[tokio::test]
    async fn test_split_is_empty_not_an_error() {
        let policy = ResubmitBlockPolicy;
        let mut request = request("acdc-1", "Resubmission", "assigned", "");
        request.original_request = "req-1".to_string();
        assert!(policy.validate(&request));
        assert!(policy.split(&request, &RequestConfig::default()).await.is_empty());
    }
}
