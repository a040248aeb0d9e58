use std::time::Duration;

use thiserror::Error;

/// Errors raised by identity backends.
///
/// The first four variants are the domain taxonomy shared by every backend
/// (SQL, directory services, in-memory). The remaining variants are store
/// failures: they are never retried and never masked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("user '{user}' already exists in backend '{backend}'")]
    UserAlreadyExists { user: String, backend: String },

    #[error("user '{user}' does not exist in backend '{backend}'")]
    UserDoesntExist { user: String, backend: String },

    #[error("group '{group}' does not exist in backend '{backend}'")]
    GroupDoesntExist { group: String, backend: String },

    #[error("missing parameter '{param}' for backend '{backend}'")]
    MissingParameter { param: String, backend: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl BackendError {
    pub fn user_already_exists(user: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::UserAlreadyExists {
            user: user.into(),
            backend: backend.into(),
        }
    }

    pub fn user_doesnt_exist(user: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::UserDoesntExist {
            user: user.into(),
            backend: backend.into(),
        }
    }

    pub fn group_doesnt_exist(group: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::GroupDoesntExist {
            group: group.into(),
            backend: backend.into(),
        }
    }

    pub fn missing_parameter(param: impl Into<String>, backend: impl Into<String>) -> Self {
        Self::MissingParameter {
            param: param.into(),
            backend: backend.into(),
        }
    }

    /// Returns true for low-level store failures (connection, query, data,
    /// timeout) as opposed to the domain errors.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::QueryFailed(_) | Self::InvalidData(_) | Self::Timeout(_)
        )
    }
}

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
