//! # Passgate Authentication Core
//!
//! Credential-ceremony and token-lifecycle engine for passwordless sign-in.
//!
//! ## Features
//!
//! - **Passkeys**: `WebAuthn` registration and authentication ceremonies with
//!   single-use challenges and signature-counter clone detection
//! - **OAuth 2.0 + PKCE**: authorization requests with `state`, and one-time
//!   authorization codes bound to client, redirect URI, and code challenge
//! - **Signing keys**: persisted Ed25519 keyset with scheduled rotation and a
//!   published JWKS that keeps the previous key through a grace window
//! - **Rate limiting**: fixed-window counters that fail open
//! - **Request resolution**: bearer token, then session cookie, with JSON or
//!   login-redirect rejections depending on who is calling
//!
//! ## Architecture
//!
//! Protocol logic depends only on the traits in [`providers`]. Short-lived
//! and single-use state lives behind [`providers::KeyValueStore`], backed by
//! [`stores::MemoryStore`] (single instance) or [`stores::RedisStore`]
//! (multi-instance). Users, credentials, sessions, and tokens are owned by
//! the persistence service ([`stores::HttpBackendClient`]).
//!
//! ```text
//! CeremonyController ──► ChallengeStore ──┐
//! AuthorizationCodeStore ─────────────────┼──► KeyValueStore
//! FixedWindowRateLimiter ─────────────────┤
//! KeyManager ─────────────────────────────┘
//! AuthResolver ──► TokenValidator / SessionValidator
//! ```
//!
//! ## Example: Passkey sign-in
//!
//! ```rust,ignore
//! use passgate_auth::config::PasskeyConfig;
//! use passgate_auth::stores::{HttpBackendClient, RedisStore};
//! use passgate_auth::webauthn::CeremonyController;
//!
//! let store = RedisStore::new("redis://127.0.0.1:6379").await?;
//! let backend = HttpBackendClient::new("https://backend.internal", api_key);
//! let ceremonies = CeremonyController::new(
//!     store,
//!     verifier,
//!     backend.clone(),
//!     backend,
//!     PasskeyConfig::new("Example"),
//! );
//!
//! // 1. Options for the browser
//! let rp = ceremonies.relying_party("app.example.com", "https")?;
//! let options = ceremonies.authentication_options(&rp, None).await?;
//!
//! // 2. Verify what the authenticator signed
//! let signed_in = ceremonies
//!     .finish_authentication(&rp, &options.challenge_id, &response)
//!     .await?;
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod challenge;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod oauth;
pub mod providers;
pub mod rate_limit;
pub mod resolver;
pub mod state;
pub mod stores;
pub mod webauthn;

// Test utilities
#[cfg(any(test, feature = "test-utils"))]
pub mod mocks;

// Re-export main types for convenience
pub use challenge::{Challenge, ChallengeKind, ChallengeStore};
pub use error::{AuthError, ErrorCategory, Result};
pub use keys::KeyManager;
pub use oauth::AuthorizationCodeStore;
pub use rate_limit::{FixedWindowRateLimiter, RateLimitDecision};
pub use resolver::{AuthRejection, AuthResolver, Resolution};
pub use state::{AuthMethod, AuthenticationResult, CredentialId, UserId};
pub use webauthn::CeremonyController;
