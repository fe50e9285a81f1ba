//! Application layer - Request-to-queue-element use cases
//!
//! This layer contains:
//! - Ports: traits for the remote data services, the workflow manager and the element store
//! - Services: aggregation, block/site resolution, start policies, job handling
//! - DTOs: jobs handed to the worker pool

pub mod dto;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod testing;
