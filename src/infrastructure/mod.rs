//! Infrastructure layer - External adapters and implementations
//!
//! This layer contains:
//! - HTTP client: retrying remote caller for the data services
//! - ReqMgr: workflow manager client
//! - Persistence: in-memory and SQLite element stores
//! - Worker pool and dispatcher: the intake/reclaim engine
//! - Config: Application configuration
//! - State: Shared application state
//! - HTTP: status routes

pub mod config;
pub mod dispatcher;
pub mod http;
pub mod http_client;
pub mod persistence;
pub mod reqmgr;
pub mod state;
pub mod worker_pool;
