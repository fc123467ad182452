//! Mock provider implementations for testing.
//!
//! This module provides simple, in-memory implementations of all provider traits
//! for use in unit and integration tests.

pub mod credential;
pub mod kv;
pub mod session;
pub mod user;
pub mod verifier;

pub use credential::MockCredentialRepository;
pub use kv::FailingKvStore;
pub use session::{MockSessionValidator, MockTokenValidator};
pub use user::MockUserRepository;
pub use verifier::MockCredentialVerifier;
