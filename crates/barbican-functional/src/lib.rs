//! Functional test utilities for the Barbican client
//!
//! This crate runs the client end to end against an in-memory service that
//! speaks the Barbican wire format, so the suites need no live deployment.

pub mod cleanup;
pub mod mock_service;

pub use cleanup::CleanUp;
pub use mock_service::{MockBarbican, MOCK_ENDPOINT};
