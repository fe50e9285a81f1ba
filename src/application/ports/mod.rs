//! Ports - Trait boundaries between the application core and its adapters

pub mod inbound;
pub mod outbound;
