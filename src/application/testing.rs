//! Test doubles for the outbound ports

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::outbound::{
    RemoteCallerPort, RemoteError, RemoteResult, WorkflowManagerError, WorkflowManagerPort,
};
use crate::domain::value_objects::{Request, RequestConfig};

#[derive(Clone)]
enum FakeReply {
    Body(String),
    Failure,
}

struct FakeRoute {
    pattern: String,
    reply: FakeReply,
    delay: Duration,
}

/// Remote caller answering from canned responses.
///
/// Routes match when their pattern is a substring of the URL; the longest
/// matching pattern wins. Unrouted URLs answer with a 404 failure.
#[derive(Default)]
pub(crate) struct FakeRemoteCaller {
    routes: Vec<FakeRoute>,
    calls: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl FakeRemoteCaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, pattern: &str, body: impl Into<String>) -> Self {
        self.routes.push(FakeRoute {
            pattern: pattern.to_string(),
            reply: FakeReply::Body(body.into()),
            delay: Duration::ZERO,
        });
        self
    }

    pub fn with_json(self, pattern: &str, value: serde_json::Value) -> Self {
        self.with_body(pattern, value.to_string())
    }

    pub fn with_failure(mut self, pattern: &str) -> Self {
        self.routes.push(FakeRoute {
            pattern: pattern.to_string(),
            reply: FakeReply::Failure,
            delay: Duration::ZERO,
        });
        self
    }

    /// Delay the most recently added route
    pub fn delayed(mut self, delay: Duration) -> Self {
        if let Some(route) = self.routes.last_mut() {
            route.delay = delay;
        }
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(pattern))
            .count()
    }
}

#[async_trait]
impl RemoteCallerPort for FakeRemoteCaller {
    async fn call(&self, url: &str, _body: Option<&str>) -> RemoteResult {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(url.to_string());

        let route = self
            .routes
            .iter()
            .filter(|route| url.contains(&route.pattern))
            .max_by_key(|route| route.pattern.len());
        let Some(route) = route else {
            return RemoteResult::failure(
                url,
                Some(404),
                RemoteError::Status {
                    status: 404,
                    url: url.to_string(),
                },
            );
        };

        if !route.delay.is_zero() {
            tokio::time::sleep(route.delay).await;
        }
        match &route.reply {
            FakeReply::Body(body) => RemoteResult::success(url, 200, body.clone().into_bytes()),
            FakeReply::Failure => RemoteResult::failure(
                url,
                Some(503),
                RemoteError::Status {
                    status: 503,
                    url: url.to_string(),
                },
            ),
        }
    }
}

/// Workflow manager serving requests from memory
#[derive(Default)]
pub(crate) struct FakeWorkflowManager {
    requests: Mutex<Vec<Request>>,
    configs: Mutex<HashMap<String, RequestConfig>>,
    unreachable: bool,
}

impl FakeWorkflowManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_request(self, request: Request) -> Self {
        self.requests.lock().unwrap().push(request);
        self
    }

    pub fn with_config(self, name: &str, config: RequestConfig) -> Self {
        self.configs
            .lock()
            .unwrap()
            .insert(name.to_string(), config);
        self
    }

    pub fn set_status(&self, name: &str, status: &str) {
        for request in self.requests.lock().unwrap().iter_mut() {
            if request.name == name {
                request.status = status.to_string();
            }
        }
    }

    fn check_reachable(&self) -> Result<(), WorkflowManagerError> {
        if self.unreachable {
            return Err(WorkflowManagerError::Remote(RemoteError::Transport(
                "connection refused".to_string(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl WorkflowManagerPort for FakeWorkflowManager {
    async fn requests_by_status(&self, status: &str) -> Result<Vec<Request>, WorkflowManagerError> {
        self.check_reachable()?;
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.status == status)
            .cloned()
            .collect())
    }

    async fn request(&self, name: &str) -> Result<Option<Request>, WorkflowManagerError> {
        self.check_reachable()?;
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .find(|request| request.name == name)
            .cloned())
    }

    async fn request_config(&self, name: &str) -> Result<RequestConfig, WorkflowManagerError> {
        self.check_reachable()?;
        Ok(self
            .configs
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default())
    }
}

/// Request in the given status that reads `input_dataset`
pub(crate) fn request(name: &str, request_type: &str, status: &str, input_dataset: &str) -> Request {
    Request {
        name: name.to_string(),
        request_type: request_type.to_string(),
        status: status.to_string(),
        input_dataset: input_dataset.to_string(),
        priority: 1000,
        ..Request::default()
    }
}
