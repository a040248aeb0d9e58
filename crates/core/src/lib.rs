//! Functional core for idbridge.
//!
//! Types, validation and group arithmetic shared by every identity backend.
//! Nothing in this crate performs I/O; concrete stores live in `idbridge`.

pub mod identity;
