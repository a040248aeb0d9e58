//! Storage backend implementations.
//!
//! This module provides concrete implementations of the `IdentityBackend`
//! trait defined in `idbridge_core::identity`. Which backends exist is decided
//! at compile time via feature flags; which one runs is decided by
//! configuration through [`build_backend`].
//!
//! # Feature Flags
//!
//! - `sqlite` (default): SQLite backend using `rusqlite` and `tokio-rusqlite`
//! - `inmemory` (default): in-memory backend, for tests and development
//!
//! Unlike the storage layer of an application, both can be enabled at once.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use idbridge_core::identity::{BackendConfig, BackendError, IdentityBackend, Result};

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryBackend;

/// Backend implementations selectable at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Sqlite,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sql" => Ok(Self::Sqlite),
            "memory" | "inmemory" => Ok(Self::Memory),
            other => Err(BackendError::InvalidData(format!(
                "unknown backend kind: {other}"
            ))),
        }
    }
}

/// Builds the backend of the given kind behind a trait object.
///
/// No store is touched here; SQLite connections are opened per call.
///
/// # Errors
///
/// `InvalidData` if the kind was compiled out.
pub fn build_backend(kind: BackendKind, config: BackendConfig) -> Result<Box<dyn IdentityBackend>> {
    match kind {
        #[cfg(feature = "sqlite")]
        BackendKind::Sqlite => Ok(Box::new(SqliteBackend::new(config))),
        #[cfg(feature = "inmemory")]
        BackendKind::Memory => Ok(Box::new(InMemoryBackend::new(config))),
        #[allow(unreachable_patterns)]
        other => {
            drop(config);
            Err(BackendError::InvalidData(format!(
                "backend '{other}' is not compiled in"
            )))
        }
    }
}

/// Bounds `operation` by `limit`, failing with `BackendError::Timeout`.
///
/// The operation is dropped when the limit expires.
#[cfg(feature = "sqlite")]
pub(crate) async fn bounded<T, F>(limit: std::time::Duration, operation: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(limit)),
    }
}
