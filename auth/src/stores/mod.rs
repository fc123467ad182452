//! Storage implementations.
//!
//! This module provides the concrete backends behind the collaborator seams:
//!
//! - **Memory Store** - In-process [`KeyValueStore`](crate::providers::KeyValueStore)
//!   with lazy expiry and a background sweeper (single instance only)
//! - **Redis Store** - Shared [`KeyValueStore`](crate::providers::KeyValueStore)
//!   with atomic `GETDEL` and counter scripts (multi-instance)
//! - **HTTP Backend Client** - Users, credentials, tokens, and sessions from
//!   the persistence service

pub mod backend_http;
pub mod memory;
pub mod redis_kv;

// Re-exports
pub use backend_http::HttpBackendClient;
pub use memory::MemoryStore;
pub use redis_kv::RedisStore;
