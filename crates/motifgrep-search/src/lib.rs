mod engine;
mod error;
mod filters;
mod host;
mod orbit;
mod plan;

pub use engine::{CancelToken, Mapping, Search, count, search};
pub use error::SearchError;
pub use host::{AttrMap, HostGraph, MemoryHost};
