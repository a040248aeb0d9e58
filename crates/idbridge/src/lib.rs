//! Pluggable identity-store backends.
//!
//! A front end holds a `Box<dyn IdentityBackend>` and performs user and group
//! CRUD plus password authentication through it, without knowing which store
//! sits behind. Types and rules live in [`idbridge_core`]; this crate provides
//! the concrete stores.
//!
//! ```rust,ignore
//! use idbridge::{build_backend, BackendConfig, BackendKind};
//!
//! let config = BackendConfig::from_params("sql", &params, attributes, "user")?;
//! let backend = build_backend(BackendKind::Sqlite, config)?;
//! if backend.authenticate("alice", "secret").await? {
//!     let groups = backend.get_groups("alice").await?;
//! }
//! ```

pub mod storage;

pub use idbridge_core::identity::{
    BackendConfig, BackendError, ConnectionParams, GroupList, IdentityBackend, Result, UserMap,
    UserRecord,
};
pub use storage::{build_backend, BackendKind};
