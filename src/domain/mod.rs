//! Domain layer - Core work-queue model with no external I/O
//!
//! This layer contains:
//! - Entities: the queue element produced for each request
//! - Value Objects: run/lumi masks, typed request records, coerced configuration, ids

pub mod entities;
pub mod value_objects;
