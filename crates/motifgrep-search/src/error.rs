use thiserror::Error;

/// Search-time failures.
///
/// A failed search ends the mapping stream; mappings already emitted remain
/// valid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    #[error("search cancelled")]
    Cancelled,
}
