//! HTTP routes

mod status_routes;

use axum::Router;
use std::sync::Arc;

use crate::infrastructure::state::AppState;

pub use status_routes::status_routes;

/// Create all routes
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new().merge(status_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::outbound::QueueElementStorePort;
    use crate::application::testing::{request, FakeRemoteCaller, FakeWorkflowManager};
    use crate::domain::entities::QueueElement;
    use crate::infrastructure::config::AppConfig;
    use crate::infrastructure::persistence::MemoryElementStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn app(manager: FakeWorkflowManager) -> Router {
        let store = Arc::new(MemoryElementStore::new());
        store
            .insert_batch(vec![QueueElement::new("a"), QueueElement::new("b")])
            .await
            .unwrap();
        let mut config = AppConfig::defaults();
        config.reqmgr_url = "http://127.0.0.1:8250/reqmgr2".to_string();
        let state = AppState::assemble(
            config,
            Arc::new(FakeRemoteCaller::new()),
            Arc::new(manager),
            store,
        );
        create_routes().with_state(Arc::new(state))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(FakeWorkflowManager::new())
            .await
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn test_status_reports_metrics_and_workflows() {
        let (status, body) = get_json(app(FakeWorkflowManager::new()).await, "/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["workflows"], 2);
        assert_eq!(body["jobs"], 0);
        assert_eq!(body["failed"], 0);
        assert_eq!(body["addrs"], serde_json::json!(["127.0.0.1"]));
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_requests_filters_by_status() {
        let manager = FakeWorkflowManager::new()
            .with_request(request("req-1", "ReReco", "assigned", "/A/B/RAW"))
            .with_request(request("req-2", "ReReco", "acquired", "/A/C/RAW"));
        let app = app(manager).await;

        let (status, body) = get_json(app.clone(), "/requests").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
        assert_eq!(body[0]["name"], "req-1");

        let (_, body) = get_json(app, "/requests?status=acquired").await;
        assert_eq!(body[0]["name"], "req-2");
    }

    #[tokio::test]
    async fn test_requests_with_unreachable_workflow_manager() {
        let (status, _) = get_json(app(FakeWorkflowManager::unreachable()).await, "/requests").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
