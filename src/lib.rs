//! Purpose: Contract-test harness for a user-management REST API.
//! Exports: `api` (public surface), `core` (request builder, decoder, validator, errors).
//! Role: Library backing the `user-contract` binaries and integration tests.
//! Invariants: The engine is synchronous; every check is a single request/response evaluation.
//! Invariants: Core modules take explicit inputs and hold no hidden state.
pub mod api;
pub mod core;
