//! Domain entities - Core business objects with identity

mod queue_element;

pub use queue_element::{ElementStatus, QueueElement, SiteMap};
