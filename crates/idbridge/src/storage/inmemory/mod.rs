//! In-memory identity backend for testing.
//!
//! Keeps every user record in a `BTreeMap` wrapped in `Arc<RwLock<_>>`.
//! Semantics match the SQLite backend; nothing is persisted.
//!
//! # Example
//!
//! ```rust,ignore
//! use idbridge::storage::inmemory::InMemoryBackend;
//!
//! let backend = InMemoryBackend::new(config);
//! backend.add_user(&record).await?;
//! ```

mod backend;

pub use backend::InMemoryBackend;
