//! Collaborator interfaces.
//!
//! This module defines traits for every external dependency of the core.
//! These traits enable dependency injection and keep the protocol logic
//! testable at memory speed.
//!
//! # Architecture
//!
//! Providers are **interfaces**, not implementations. The ceremony
//! controller, code store, key manager, rate limiter, and resolver depend on
//! these traits; the application wires in concrete implementations.
//!
//! ```text
//! ┌──────────────────────┐      ┌──────────────────────────────┐
//! │ CeremonyController   │─────►│ CredentialVerifier (WebAuthn │
//! │                      │      │ attestation/assertion crypto)│
//! │                      │─────►│ UserRepository               │
//! │                      │─────►│ CredentialRepository         │
//! └──────────────────────┘      └──────────────────────────────┘
//! ┌──────────────────────┐      ┌──────────────────────────────┐
//! │ AuthResolver         │─────►│ TokenValidator               │
//! │                      │─────►│ SessionValidator             │
//! └──────────────────────┘      └──────────────────────────────┘
//! ┌──────────────────────┐      ┌──────────────────────────────┐
//! │ Challenge/Code store │─────►│ KeyValueStore (memory/Redis) │
//! │ RateLimiter, Keys    │      └──────────────────────────────┘
//! └──────────────────────┘
//! ```
//!
//! This enables:
//! - **Testing**: Use mocks (in-memory, deterministic)
//! - **Production**: Use real services (`Redis`, the backend API over HTTPS)
//! - **Single instance**: Use [`crate::stores::MemoryStore`] for the key/value seam

use crate::state::{CredentialId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod credential;
pub mod kv;
pub mod session;
pub mod user;
pub mod verifier;

// Re-export provider traits
pub use credential::CredentialRepository;
pub use kv::KeyValueStore;
pub use session::{SessionValidator, TokenValidator};
pub use user::UserRepository;
pub use verifier::{
    AuthenticationVerification, CredentialVerifier, ExpectedCeremony, RegistrationVerification,
};

/// User profile as returned by the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,

    /// Email address.
    pub email: String,

    /// Display name.
    pub display_name: Option<String>,
}

impl User {
    /// Name to show in authenticator UI, falling back to the email.
    #[must_use]
    pub fn display_name_or_email(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Whether a credential is bound to one device or synced across several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialDeviceType {
    /// Hardware-bound credential.
    SingleDevice,
    /// Synced passkey; counters typically stay at zero.
    MultiDevice,
}

/// Passkey credential.
///
/// Owned by the persistence service; this crate reads it for verification
/// and writes it on registration and on each verified authentication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// Credential ID (unique).
    pub id: CredentialId,

    /// Owning user.
    pub user_id: UserId,

    /// Public key (COSE format).
    pub public_key: Vec<u8>,

    /// Signature counter (clone detection).
    pub signature_counter: u32,

    /// Transport hints reported at registration (`internal`, `hybrid`, …).
    pub transports: Vec<String>,

    /// Device binding.
    pub device_type: CredentialDeviceType,

    /// Backup state flag reported by the authenticator.
    pub backed_up: bool,

    /// Created timestamp.
    pub created_at: DateTime<Utc>,

    /// Last successful authentication.
    pub last_used_at: Option<DateTime<Utc>>,
}

/// Identity established by a token or session validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedIdentity {
    /// Authenticated user.
    pub user: User,

    /// Expiry of the presented token or session.
    pub expires_at: DateTime<Utc>,
}
