//! Purpose: Shared library crate used by the `swisskit` CLI and tests.
//! Exports: `api` (public surface) and `core` (streaming engines, utilities, errors).
//! Role: Library backing the binary; callers should prefer `api`.
//! Invariants: Library code returns errors and never logs-and-swallows them.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
