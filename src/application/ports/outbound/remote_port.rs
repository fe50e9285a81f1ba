//! Remote data-service port
//!
//! A single HTTP exchange with one of the external data services. Failures are
//! values: they travel inside the [`RemoteResult`] so a caller aggregating many
//! calls decides what a failure means for its round.

use async_trait::async_trait;

/// One call to issue during an aggregation round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    /// Correlation key chosen by the caller, usually a block or dataset name
    pub name: String,
    pub url: String,
    /// JSON body; when present the call is a POST
    pub body: Option<String>,
}

impl RemoteCall {
    pub fn get(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            body: None,
        }
    }

    pub fn post(name: impl Into<String>, url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            body: Some(body.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("bad request: invalid URL '{0}'")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("remote call task failed: {0}")]
    TaskFailed(String),
}

/// Outcome of one remote call, produced exactly once per call
#[derive(Debug, Clone)]
pub struct RemoteResult {
    pub url: String,
    pub data: Vec<u8>,
    pub error: Option<RemoteError>,
    pub status: Option<u16>,
}

impl RemoteResult {
    pub fn success(url: impl Into<String>, status: u16, data: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            data,
            error: None,
            status: Some(status),
        }
    }

    pub fn failure(url: impl Into<String>, status: Option<u16>, error: RemoteError) -> Self {
        Self {
            url: url.into(),
            data: Vec::new(),
            error: Some(error),
            status,
        }
    }

    /// Rejected before any network attempt
    pub fn bad_request(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::failure(url.clone(), Some(400), RemoteError::InvalidUrl(url))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Body as text, lossy for non UTF-8 payloads
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Port for issuing a single remote call with the caller's retry budget
#[async_trait]
pub trait RemoteCallerPort: Send + Sync {
    async fn call(&self, url: &str, body: Option<&str>) -> RemoteResult;
}
