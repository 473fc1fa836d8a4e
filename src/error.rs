//! Surfaced error taxonomy.
//!
//! Internal plumbing (region lookup, buffer bookkeeping) uses `anyhow::Result`
//! with context, same as the rest of this crate. `SearchEngineError` is the
//! small set of conditions a host is expected to branch on; everything else
//! either recovers locally (an unreadable element drops its page/result) or
//! is surfaced through a return value rather than an error (a `max_results`
//! cap being hit).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchEngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session not initialized")]
    NotInitialized,
}

pub type Result<T> = std::result::Result<T, SearchEngineError>;
