//! Error types for the API client and the sync engine.
//!
//! # Design
//! `ApiError` describes a single failed remote call. `SyncError` is the
//! engine-level error and is always scoped: malformed records, duplicate
//! identities and missing scope categories fail one category, API errors fail one item (or one category
//! when they happen while fetching), persistence errors are only logged.

use thiserror::Error;

use crate::category::Category;

/// Errors returned by `CloseClient` parse methods and by transports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned 404.
    #[error("resource not found")]
    NotFound,

    /// The server returned a non-2xx status other than 404.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connect, DNS, timeout).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Whether repeating the same call later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors raised while reconciling one category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A record's identity (or another required field) could not be read.
    #[error("malformed {category} record: {reason}")]
    MalformedRecord { category: Category, reason: String },

    /// Two records in one environment resolve to the same identity key.
    #[error("duplicate {category} identity {key:?} in {environment}")]
    DuplicateIdentity {
        category: Category,
        environment: String,
        key: String,
    },

    /// A category's identity is scoped by another category whose snapshots
    /// could not be fetched.
    #[error("{category} needs {dependency}, which could not be fetched")]
    DependencyUnavailable {
        category: Category,
        dependency: Category,
    },

    /// A remote call failed.
    #[error("{environment}: {source}")]
    Api {
        environment: String,
        #[source]
        source: ApiError,
    },

    /// An archival write failed.
    #[error("could not persist {path}: {reason}")]
    Persistence { path: String, reason: String },
}

pub type SyncResult<T> = Result<T, SyncError>;
