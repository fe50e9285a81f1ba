//! WorkQueue Engine - Turns approved workflow requests into site-aware queue elements
//!
//! Requests approved by the workflow manager are split by a start policy into
//! queue elements: input blocks, their run/lumi masks and the sites holding
//! them. Elements are persisted for downstream agents and reclaimed once the
//! owning workflow closes.

pub mod application;
pub mod domain;
pub mod infrastructure;
