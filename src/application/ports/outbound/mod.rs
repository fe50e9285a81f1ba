//! Outbound ports - Interfaces that the application requires from external systems

mod element_store_port;
mod remote_port;
mod workflow_manager_port;

pub use element_store_port::{QueueElementStorePort, StoreError, StoredElement};
pub use remote_port::{RemoteCall, RemoteCallerPort, RemoteError, RemoteResult};
pub use workflow_manager_port::{WorkflowManagerError, WorkflowManagerPort};
