//! Token signing keys.
//!
//! - [`jwk`]: Ed25519 JWKs and RFC 7638 key ids
//! - [`jws`]: compact `EdDSA` JWS
//! - [`manager`]: persisted keyset with rotation and a grace window

pub mod jwk;
pub mod jws;
pub mod manager;

pub use jwk::{Jwk, JwkSet};
pub use manager::{KeyManager, KeySet};
