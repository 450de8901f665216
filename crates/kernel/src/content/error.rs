//! Tree operation errors.
//!
//! Every mutating or resolving operation returns one of these instead of
//! unwinding. The HTTP boundary maps each variant to a status code.

use thiserror::Error;

/// Errors produced by tree management operations.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The request does not resolve to any item.
    #[error("no item selected: {0}")]
    Resolution(String),

    /// A structural rule would be violated by the requested mutation.
    #[error("{0}")]
    Integrity(String),

    /// Malformed request input.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A referenced item does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The principal may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The store or index failed.
    #[error("storage failure")]
    Store(#[from] anyhow::Error),
}

impl TreeError {
    pub fn integrity(reason: impl Into<String>) -> Self {
        Self::Integrity(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Short machine-readable kind used in error bodies and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::Integrity(_) => "integrity",
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::Store(_) => "store",
        }
    }
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
