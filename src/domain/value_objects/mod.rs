//! Value objects - Immutable objects defined by their attributes

mod ids;
mod lumis;
mod request;

pub use ids::{ElementId, Revision};
pub use lumis::{FileLumis, MaskedBlock, RunLumis};
pub use request::{ConfigValue, Request, RequestConfig};
