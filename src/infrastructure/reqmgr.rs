//! Workflow manager client over the remote caller

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::application::ports::outbound::{
    RemoteCallerPort, RemoteResult, WorkflowManagerError, WorkflowManagerPort,
};
use crate::application::services::data_services::{decode_as, endpoint_url, Record, ServiceKind};
use crate::domain::value_objects::{Request, RequestConfig};

pub struct ReqMgrClient {
    caller: Arc<dyn RemoteCallerPort>,
    base_url: String,
}

impl ReqMgrClient {
    pub fn new(caller: Arc<dyn RemoteCallerPort>, base_url: &str) -> Self {
        Self {
            caller,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(
        &self,
        endpoint: &str,
        key: &str,
        value: &str,
    ) -> Result<RemoteResult, WorkflowManagerError> {
        let url = endpoint_url(&self.base_url, endpoint, &[(key, value)]);
        let mut result = self.caller.call(&url, None).await;
        match result.error.take() {
            Some(e) => Err(e.into()),
            None => Ok(result),
        }
    }

    async fn fetch_requests(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<Request>, WorkflowManagerError> {
        let result = self.fetch("request", key, value).await?;
        let rows = decode_as(ServiceKind::ReqMgr, &result.data)
            .map_err(|e| WorkflowManagerError::Decode(e.to_string()))?;
        let requests: Vec<Request> = rows.iter().flat_map(requests_in_row).collect();
        debug!("Workflow manager returned {} requests for {}={}", requests.len(), key, value);
        Ok(requests)
    }
}

/// A result row is either one flat request record or a `{name: record}` map
fn requests_in_row(row: &Record) -> Vec<Request> {
    if let Some(Value::String(name)) = row.get("RequestName") {
        return vec![Request::from_record(name, row)];
    }
    row.iter()
        .filter_map(|(name, value)| value.as_object().map(|record| Request::from_record(name, record)))
        .collect()
}

#[async_trait]
impl WorkflowManagerPort for ReqMgrClient {
    async fn requests_by_status(&self, status: &str) -> Result<Vec<Request>, WorkflowManagerError> {
        self.fetch_requests("status", status).await
    }

    async fn request(&self, name: &str) -> Result<Option<Request>, WorkflowManagerError> {
        let requests = self.fetch_requests("name", name).await?;
        Ok(requests.into_iter().find(|request| request.name == name))
    }

    async fn request_config(&self, name: &str) -> Result<RequestConfig, WorkflowManagerError> {
        let result = self.fetch("config", "name", name).await?;
        Ok(RequestConfig::parse(&result.text()))
    }
}
