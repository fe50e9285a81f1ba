//! Per-service payload decoders
//!
//! Every data service speaks its own JSON dialect. The service behind a URL is
//! recognised by a marker in the URL itself and the matching decoder turns the
//! body into flat records. URLs of unknown services decode to no records.

mod dbs;
mod phedex;
mod reqmgr;
mod sitedb;

use serde_json::{Map, Value};

/// One decoded row of a data-service response
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Replica locator
    Phedex,
    /// Dataset catalog
    Dbs,
    /// Workflow manager
    ReqMgr,
    /// Site directory
    SiteDb,
}

impl ServiceKind {
    /// Markers are checked in order; the first one found in the URL wins
    const MARKERS: [(&'static str, ServiceKind); 4] = [
        ("phedex", ServiceKind::Phedex),
        ("dbs", ServiceKind::Dbs),
        ("reqmgr", ServiceKind::ReqMgr),
        ("sitedb", ServiceKind::SiteDb),
    ];

    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.to_ascii_lowercase();
        Self::MARKERS
            .iter()
            .find(|(marker, _)| url.contains(marker))
            .map(|(_, kind)| *kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Phedex => "phedex",
            Self::Dbs => "dbs",
            Self::ReqMgr => "reqmgr",
            Self::SiteDb => "sitedb",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{service} payload could not be decoded: {reason}")]
pub struct DecodeError {
    pub service: &'static str,
    pub reason: String,
}

impl DecodeError {
    fn new(kind: ServiceKind, reason: impl std::fmt::Display) -> Self {
        Self {
            service: kind.name(),
            reason: reason.to_string(),
        }
    }
}

/// Decode a response body according to the service its URL points at
pub fn decode(url: &str, data: &[u8]) -> Result<Vec<Record>, DecodeError> {
    match ServiceKind::from_url(url) {
        Some(kind) => decode_as(kind, data),
        None => Ok(Vec::new()),
    }
}

/// Decode a response body from a known service regardless of its URL
pub fn decode_as(kind: ServiceKind, data: &[u8]) -> Result<Vec<Record>, DecodeError> {
    match kind {
        ServiceKind::Phedex => phedex::decode(data),
        ServiceKind::Dbs => dbs::decode(data),
        ServiceKind::ReqMgr => reqmgr::decode(data),
        ServiceKind::SiteDb => sitedb::decode(data),
    }
}

/// Build `<base>/<endpoint>?<params>` with the parameters percent-encoded.
///
/// A base that does not parse is passed through unencoded so the remote caller
/// rejects it as a bad request.
pub fn endpoint_url(base: &str, endpoint: &str, params: &[(&str, &str)]) -> String {
    let raw = format!("{}/{}", base.trim_end_matches('/'), endpoint);
    match reqwest::Url::parse_with_params(&raw, params) {
        Ok(url) => url.to_string(),
        Err(_) => raw,
    }
}

fn parse_json(kind: ServiceKind, data: &[u8]) -> Result<Value, DecodeError> {
    serde_json::from_slice(data).map_err(|e| DecodeError::new(kind, e))
}
