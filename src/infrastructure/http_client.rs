//! Remote caller for the data services
//!
//! Validates the URL, then performs the call through an [`HttpTransport`]
//! with a bounded, linearly increasing retry backoff. Failures are returned
//! inside the [`RemoteResult`], never raised.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use crate::application::ports::outbound::{RemoteCallerPort, RemoteError, RemoteResult};

/// A single HTTP attempt, no retries
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, url: &str, body: Option<&str>) -> RemoteResult;
}

/// reqwest-backed transport. A body turns the call into a JSON POST.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, url: &str, body: Option<&str>) -> RemoteResult {
        let request = match body {
            Some(body) => self
                .client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string()),
            None => self.client.get(url),
        }
        .header(ACCEPT, "application/json");

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return RemoteResult::failure(url, None, RemoteError::Transport(e.to_string())),
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return RemoteResult::failure(
                url,
                Some(status),
                RemoteError::Status {
                    status,
                    url: url.to_string(),
                },
            );
        }
        match response.bytes().await {
            Ok(bytes) => RemoteResult::success(url, status, bytes.to_vec()),
            Err(e) => RemoteResult::failure(url, Some(status), RemoteError::Transport(e.to_string())),
        }
    }
}

/// Retry budget: `retries` extra attempts, the n-th waiting `n * backoff_step`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    pub fn new(backoff_step: Duration) -> Self {
        Self {
            retries: 3,
            backoff_step,
        }
    }

    pub fn delay(&self, retry: u32) -> Duration {
        self.backoff_step * retry
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

pub struct RemoteCaller<T = ReqwestTransport> {
    transport: T,
    retry: RetryPolicy,
    verbose: u8,
}

impl RemoteCaller<ReqwestTransport> {
    pub fn new(retry: RetryPolicy, verbose: u8) -> Self {
        Self::with_transport(ReqwestTransport::new(), retry, verbose)
    }
}

impl<T: HttpTransport> RemoteCaller<T> {
    pub fn with_transport(transport: T, retry: RetryPolicy, verbose: u8) -> Self {
        Self {
            transport,
            retry,
            verbose,
        }
    }
}

/// Only absolute http(s) URLs are dispatched
fn is_valid_url(url: &str) -> bool {
    Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
        .unwrap_or(false)
}

#[async_trait]
impl<T: HttpTransport> RemoteCallerPort for RemoteCaller<T> {
    async fn call(&self, url: &str, body: Option<&str>) -> RemoteResult {
        if !is_valid_url(url) {
            warn!("Refusing to call malformed URL '{}'", url);
            return RemoteResult::bad_request(url);
        }

        let started = Instant::now();
        if self.verbose >= 2 {
            if let Some(body) = body {
                debug!("POST {} body: {}", url, body);
            }
        }

        let mut result = self.transport.send(url, body).await;
        let mut retry = 0;
        while !result.is_success() && retry < self.retry.retries {
            retry += 1;
            let delay = self.retry.delay(retry);
            if let Some(e) = &result.error {
                warn!(
                    "Call to {} failed: {}; retry {}/{} in {:?}",
                    url, e, retry, self.retry.retries, delay
                );
            }
            tokio::time::sleep(delay).await;
            result = self.transport.send(url, body).await;
        }

        if self.verbose >= 1 {
            let method = if body.is_some() { "POST" } else { "GET" };
            info!(
                "{} {} -> {:?} in {:?} after {} attempts",
                method,
                url,
                result.status,
                started.elapsed(),
                retry + 1
            );
        }
        if self.verbose >= 2 {
            debug!("{} returned {} bytes", url, result.data.len());
        }
        if let Some(e) = &result.error {
            warn!("Giving up on {} after {} attempts: {}", url, retry + 1, e);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Answers from a script of outcomes, failing once the script runs out
    struct ScriptedTransport {
        script: Mutex<VecDeque<bool>>,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, url: &str, _body: Option<&str>) -> RemoteResult {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let ok = self.script.lock().unwrap().pop_front().unwrap_or(false);
            if ok {
                RemoteResult::success(url, 200, b"[]".to_vec())
            } else {
                RemoteResult::failure(
                    url,
                    Some(502),
                    RemoteError::Status {
                        status: 502,
                        url: url.to_string(),
                    },
                )
            }
        }
    }

    fn caller(script: &[bool]) -> (Arc<AtomicUsize>, RemoteCaller<ScriptedTransport>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let transport = ScriptedTransport {
            script: Mutex::new(script.iter().copied().collect()),
            attempts: attempts.clone(),
        };
        let retry = RetryPolicy::new(Duration::from_millis(1));
        (attempts, RemoteCaller::with_transport(transport, retry, 2))
    }

    #[tokio::test]
    async fn test_malformed_url_is_rejected_without_attempts() {
        let (attempts, caller) = caller(&[true]);
        for url in ["not a url", "ftp://host/file", "/relative/path", ""] {
            let result = caller.call(url, None).await;
            assert_eq!(result.status, Some(400));
            assert!(matches!(result.error, Some(RemoteError::InvalidUrl(_))));
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let (attempts, caller) = caller(&[true]);
        let result = caller.call("http://fake/dbs/blocks", None).await;
        assert!(result.is_success());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_two_failures_then_success() {
        let (attempts, caller) = caller(&[false, false, true]);
        let result = caller.call("http://fake/dbs/blocks", None).await;
        assert!(result.is_success());
        assert_eq!(result.text(), "[]");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_returns_last_error_after_budget() {
        let (attempts, caller) = caller(&[]);
        let result = caller.call("http://fake/dbs/blocks", Some("{}")).await;
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        assert_eq!(result.status, Some(502));
        assert!(matches!(result.error, Some(RemoteError::Status { status: 502, .. })));
    }

    #[test]
    fn test_backoff_grows_linearly() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.retries, 3);
        assert_eq!(retry.delay(1), Duration::from_secs(1));
        assert_eq!(retry.delay(2), Duration::from_secs(2));
        assert_eq!(retry.delay(3), Duration::from_secs(3));
    }
}
