//! Per-request identity resolution.
//!
//! # Pipeline
//!
//! ```text
//! Authorization: Bearer <token> ──► TokenValidator ──► Token(result)
//!         │ absent / invalid
//!         ▼
//! Cookie: session=<id> ─────────► SessionValidator ──► Session(result)
//!         │ absent / invalid
//!         ▼
//! Unauthenticated { clear_session_cookie }
//! ```
//!
//! An invalid session cookie is flagged for clearing so a corrupted cookie
//! does not fail every subsequent request. Validator outages are returned
//! as errors rather than `Unauthenticated`: the resolver gates identity and
//! fails closed, and a live session is never cleared because the backend is
//! down.

pub mod cookie;
pub mod rejection;
pub mod request;

pub use cookie::{clear_session_cookie, find_cookie, session_cookie};
pub use rejection::{AuthRejection, ErrorBody, Presentation};
pub use request::{ClientKind, bearer_token, classify};

use crate::config::ResolverConfig;
use crate::error::{AuthError, ErrorCategory, Result};
use crate::providers::{SessionValidator, TokenValidator, ValidatedIdentity};
use crate::state::{AuthMethod, AuthenticationResult};
use chrono::{DateTime, Utc};
use http::HeaderMap;

/// Outcome of resolving a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Authenticated by bearer token.
    Token(AuthenticationResult),
    /// Authenticated by session cookie.
    Session(AuthenticationResult),
    /// No valid credential.
    Unauthenticated {
        /// A session cookie was presented but rejected; send a clearing cookie.
        clear_session_cookie: bool,
    },
}

impl Resolution {
    /// The established identity, if any.
    #[must_use]
    pub const fn result(&self) -> Option<&AuthenticationResult> {
        match self {
            Self::Token(result) | Self::Session(result) => Some(result),
            Self::Unauthenticated { .. } => None,
        }
    }

    /// Returns `true` if a credential was accepted.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.result().is_some()
    }
}

/// Resolves the caller's identity from request headers.
#[derive(Debug, Clone)]
pub struct AuthResolver<T, S> {
    tokens: T,
    sessions: S,
    config: ResolverConfig,
}

impl<T: TokenValidator, S: SessionValidator> AuthResolver<T, S> {
    /// Create a resolver.
    #[must_use]
    pub const fn new(tokens: T, sessions: S, config: ResolverConfig) -> Self {
        Self {
            tokens,
            sessions,
            config,
        }
    }

    /// Get the resolver configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve identity, bearer token first, then session cookie.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if a validator cannot be
    /// reached.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Resolution> {
        self.resolve_at(headers, Utc::now()).await
    }

    /// [`resolve`](Self::resolve) with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UpstreamUnavailable` if a validator cannot be
    /// reached.
    pub async fn resolve_at(&self, headers: &HeaderMap, now: DateTime<Utc>) -> Result<Resolution> {
        if let Some(token) = bearer_token(headers) {
            match self.tokens.validate_token(token).await {
                Ok(Some(identity)) if identity.expires_at > now => {
                    let result = self.result(identity, AuthMethod::Token, now);
                    tracing::debug!(user_id = %result.user.id, "Resolved bearer token");
                    return Ok(Resolution::Token(result));
                }
                Ok(_) => {
                    tracing::debug!("Bearer token rejected, trying session cookie");
                }
                Err(e) if e.category() == ErrorCategory::Upstream => return Err(e),
                Err(e) => {
                    tracing::warn!(error = %e, "Bearer token validation failed");
                }
            }
        }

        let Some(session_id) = find_cookie(headers, &self.config.session_cookie_name) else {
            return Ok(Resolution::Unauthenticated {
                clear_session_cookie: false,
            });
        };

        match self.sessions.validate_session(session_id).await {
            Ok(Some(identity)) if identity.expires_at > now => {
                let result = self.result(identity, AuthMethod::Session, now);
                tracing::debug!(user_id = %result.user.id, "Resolved session cookie");
                Ok(Resolution::Session(result))
            }
            Ok(_) => {
                tracing::debug!("Session cookie rejected, clearing");
                Ok(Resolution::Unauthenticated {
                    clear_session_cookie: true,
                })
            }
            Err(e) if e.category() == ErrorCategory::Upstream => Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "Session validation failed, clearing");
                Ok(Resolution::Unauthenticated {
                    clear_session_cookie: true,
                })
            }
        }
    }

    /// Resolve identity for a route that requires it.
    ///
    /// Failures come back as an [`AuthRejection`] shaped for the caller
    /// (JSON or login redirect), carrying a clearing cookie when the session
    /// cookie was rejected.
    ///
    /// # Errors
    ///
    /// Returns an `AuthRejection` if no credential was accepted or a
    /// validator is unreachable.
    pub async fn require(
        &self,
        path: &str,
        headers: &HeaderMap,
    ) -> std::result::Result<AuthenticationResult, AuthRejection> {
        let client = classify(path, headers, &self.config);

        match self.resolve(headers).await {
            Ok(Resolution::Token(result) | Resolution::Session(result)) => Ok(result),
            Ok(Resolution::Unauthenticated {
                clear_session_cookie: clear,
            }) => {
                let rejection =
                    AuthRejection::new(&AuthError::Unauthenticated, client, path, &self.config);
                Err(if clear {
                    rejection.with_set_cookie(clear_session_cookie(&self.config))
                } else {
                    rejection
                })
            }
            Err(e) => {
                tracing::warn!(error = %e, path = %path, "Identity resolution unavailable");
                Err(AuthRejection::new(&e, client, path, &self.config))
            }
        }
    }

    fn result(
        &self,
        identity: ValidatedIdentity,
        method: AuthMethod,
        now: DateTime<Utc>,
    ) -> AuthenticationResult {
        AuthenticationResult {
            needs_refresh: identity.expires_at - now < self.config.refresh_threshold,
            user: identity.user,
            method,
            expires_at: identity.expires_at,
        }
    }
}
