//! # Sync Error Types
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Remote (§7 kinds)   │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  ConnectFailed  │  │  NetworkTransient       │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Server5xx              │ │
//! │  │                 │  │                 │  │  AuthExpired            │ │
//! │  │                 │  │                 │  │  Conflict               │ │
//! │  │                 │  │                 │  │  NotFound               │ │
//! │  │                 │  │                 │  │  Validation             │ │
//! │  │                 │  │                 │  │  StoreUnavailable       │ │
//! │  │                 │  │                 │  │  InvariantViolation     │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │     Outbox      │                              │
//! │  │                 │  │                 │                              │
//! │  │  DatabaseError  │  │  MaxRetries     │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

/// The eight error kinds a `RemoteClient` call can resolve to, per the
/// propagation policy: transient/5xx are absorbed by backoff, auth-expired
/// surfaces a signed-out condition, conflict/not-found are treated as
/// success-equivalent on CREATE/DELETE respectively, validation and
/// invariant-violation always surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    NetworkTransient,
    Server5xx,
    AuthExpired,
    Conflict,
    NotFound,
    Validation,
    StoreUnavailable,
    InvariantViolation,
}

impl RemoteErrorKind {
    /// Whether the sync engine should leave the item PENDING and re-arm
    /// backoff, as opposed to marking it permanently FAILED.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteErrorKind::NetworkTransient | RemoteErrorKind::Server5xx
        )
    }
}

/// Sync error type covering outbox processing, transport, and
/// configuration failures.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid sync configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid base url: {0}")]
    InvalidUrl(String),

    #[error("failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("failed to save config: {0}")]
    ConfigSaveFailed(String),

    #[error("remote call failed ({kind:?}): {message}")]
    Remote {
        kind: RemoteErrorKind,
        message: String,
    },

    #[error("connection to remote service failed: {0}")]
    ConnectionFailed(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("serialization failed: {0}")]
    SerializationFailed(String),

    #[error("database error: {0}")]
    DatabaseError(String),

    #[error("max retries exceeded for outbox item {id}: {last_error}")]
    MaxRetriesExceeded { id: String, last_error: String },

    #[error("internal sync engine error: {0}")]
    Internal(String),

    #[error("sync engine is shutting down")]
    ShuttingDown,

    #[error("channel error: {0}")]
    ChannelError(String),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::Remote { kind, .. } => kind.is_transient(),
            _ => false,
        }
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

impl From<inkwell_db::DbError> for SyncError {
    fn from(err: inkwell_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(0)
        } else if err.is_connect() {
            SyncError::ConnectionFailed(err.to_string())
        } else if let Some(status) = err.status() {
            let kind = classify_status(status.as_u16());
            SyncError::Remote {
                kind,
                message: err.to_string(),
            }
        } else {
            SyncError::Remote {
                kind: RemoteErrorKind::NetworkTransient,
                message: err.to_string(),
            }
        }
    }
}

/// Classifies an HTTP status code into one of the eight propagation-policy
/// error kinds.
pub fn classify_status(status: u16) -> RemoteErrorKind {
    match status {
        401 | 403 => RemoteErrorKind::AuthExpired,
        404 => RemoteErrorKind::NotFound,
        409 => RemoteErrorKind::Conflict,
        422 => RemoteErrorKind::Validation,
        500..=599 => RemoteErrorKind::Server5xx,
        _ => RemoteErrorKind::NetworkTransient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_5xx_are_retryable() {
        let err = SyncError::Remote {
            kind: RemoteErrorKind::Server5xx,
            message: "boom".into(),
        };
        assert!(err.is_retryable());

        let err = SyncError::Remote {
            kind: RemoteErrorKind::Validation,
            message: "bad input".into(),
        };
        assert!(!err.is_retryable());
    }

    #[test]
    fn classify_status_maps_conflict_and_not_found() {
        assert_eq!(classify_status(409), RemoteErrorKind::Conflict);
        assert_eq!(classify_status(404), RemoteErrorKind::NotFound);
        assert_eq!(classify_status(503), RemoteErrorKind::Server5xx);
        assert_eq!(classify_status(401), RemoteErrorKind::AuthExpired);
    }

    #[test]
    fn config_errors_are_not_retryable() {
        let err = SyncError::InvalidUrl("not a url".into());
        assert!(err.is_config_error());
        assert!(!err.is_retryable());
    }
}
