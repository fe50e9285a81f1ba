//! Data Transfer Objects - Payloads crossing the worker boundary

mod queue_items;

pub use queue_items::{Job, JobKind};
