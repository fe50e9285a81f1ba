//! Status and monitoring routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::infrastructure::state::AppState;

pub fn status_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/status", get(get_status))
        .route("/requests", get(list_requests))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let workflows = state
        .store
        .count_workflows()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let metrics = state.metrics.snapshot();
    let addrs = host_addrs(&state.config.reqmgr_url).await;

    Ok(Json(json!({
        "addrs": addrs,
        "workers": state.pool.size(),
        "jobs": metrics.jobs,
        "active": metrics.active,
        "failed": metrics.failed,
        "workflows": workflows,
        "started_at": state.started_at.to_rfc3339(),
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

/// Local addresses this host uses to reach the workflow manager
async fn host_addrs(reqmgr_url: &str) -> Vec<String> {
    let Some((host, port)) = reqwest::Url::parse(reqmgr_url).ok().and_then(|url| {
        let port = url.port_or_known_default()?;
        Some((url.host_str()?.to_string(), port))
    }) else {
        return Vec::new();
    };

    let remotes = match tokio::time::timeout(
        Duration::from_secs(2),
        tokio::net::lookup_host((host.as_str(), port)),
    )
    .await
    {
        Ok(Ok(remotes)) => remotes.collect::<Vec<_>>(),
        Ok(Err(e)) => {
            debug!("Unable to resolve {}: {}", host, e);
            return Vec::new();
        }
        Err(_) => {
            debug!("Timed out resolving {}", host);
            return Vec::new();
        }
    };

    let mut addrs = BTreeSet::new();
    for remote in remotes {
        match local_addr_towards(remote).await {
            Ok(local) => {
                addrs.insert(local.to_string());
            }
            Err(e) => debug!("No route to {}: {}", remote, e),
        }
    }
    addrs.into_iter().collect()
}

/// Connecting a datagram socket picks the outgoing interface without sending anything
async fn local_addr_towards(remote: SocketAddr) -> std::io::Result<IpAddr> {
    let unspecified: IpAddr = match remote {
        SocketAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        SocketAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
    };
    let socket = UdpSocket::bind((unspecified, 0)).await?;
    socket.connect(remote).await?;
    Ok(socket.local_addr()?.ip())
}

#[derive(Debug, Deserialize)]
pub struct RequestsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RequestSummary {
    pub name: String,
    pub request_type: String,
    pub status: String,
    pub priority: i64,
    pub input_dataset: String,
}

async fn list_requests(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RequestsQuery>,
) -> Result<Json<Vec<RequestSummary>>, (StatusCode, String)> {
    let status = query
        .status
        .unwrap_or_else(|| state.config.request_status.clone());
    let requests = state
        .workflow_manager
        .requests_by_status(&status)
        .await
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))?;

    Ok(Json(
        requests
            .into_iter()
            .map(|request| RequestSummary {
                name: request.name,
                request_type: request.request_type,
                status: request.status,
                priority: request.priority,
                input_dataset: request.input_dataset,
            })
            .collect(),
    ))
}
