//! Job payloads - What a dispatch task hands to a worker
//!
//! A job is built by one dispatch task and consumed by exactly one worker;
//! nothing inside it is shared for mutation.

use crate::application::ports::outbound::StoredElement;
use crate::domain::value_objects::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Process,
    Cleanup,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => f.write_str("process"),
            Self::Cleanup => f.write_str("cleanup"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Job {
    /// Split a newly approved request into queue elements and persist them
    Process(Request),
    /// Reclaim a persisted element once its workflow has been closed
    Cleanup(StoredElement),
}

impl Job {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Process(_) => JobKind::Process,
            Self::Cleanup(_) => JobKind::Cleanup,
        }
    }

    pub fn request_name(&self) -> &str {
        match self {
            Self::Process(request) => &request.name,
            Self::Cleanup(stored) => &stored.element.request_name,
        }
    }
}
