//! `OAuth2` / OIDC authorization code flow with PKCE.
//!
//! - [`pkce`]: verifier/challenge pairs and constant-time `state` checks
//! - [`authorize`]: building the provider redirect and validating the return
//! - [`code`]: one-time authorization codes for clients of this service

pub mod authorize;
pub mod code;
pub mod pkce;

pub use authorize::{OAuthClient, PendingAuthorization};
pub use code::{AuthorizationCodeStore, AuthorizationGrant, GrantRequest};
pub use pkce::PkcePair;
