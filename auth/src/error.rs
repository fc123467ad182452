//! Error types for ceremony, grant, and token-lifecycle operations.

use thiserror::Error;

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Coarse classification of an [`AuthError`].
///
/// The HTTP layer uses this to pick a status code and to decide whether a
/// failure is retried by re-issuing state (`Expired`) or surfaced as a hard
/// failure (`Replay`, `Mismatch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Challenge, code, or state past its TTL. Recoverable by re-issuing.
    Expired,
    /// Single-use value reused, or authenticator counter went backwards.
    Replay,
    /// Origin, RP id, redirect URI, client id, or PKCE binding mismatch.
    Mismatch,
    /// Persistence service or key/value store unreachable.
    Upstream,
    /// Malformed or unverifiable input from the caller.
    Invalid,
    /// Caller exceeded a rate limit.
    RateLimited,
    /// Bug or misconfiguration on our side.
    Internal,
}

/// Error taxonomy for the authentication core.
///
/// Protocol failures are returned as values so callers can choose between a
/// redirect and a JSON body. None of them carry secret material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    // ═══════════════════════════════════════════════════════════
    // Expired state
    // ═══════════════════════════════════════════════════════════

    /// `WebAuthn` challenge has expired.
    #[error("WebAuthn challenge has expired")]
    ChallengeExpired,

    /// Authorization code has expired.
    #[error("Authorization code has expired")]
    CodeExpired,

    /// `OAuth` state parameter has expired.
    #[error("OAuth state has expired")]
    StateExpired,

    // ═══════════════════════════════════════════════════════════
    // Replay
    // ═══════════════════════════════════════════════════════════

    /// `WebAuthn` challenge not found (never issued or already consumed).
    #[error("WebAuthn challenge not found")]
    ChallengeNotFound,

    /// Authorization code not found (never issued or already consumed).
    #[error("Authorization code not found")]
    CodeNotFound,

    /// Authenticator signature counter did not increase.
    #[error("Signature counter replay detected (stored {stored}, reported {reported})")]
    CounterReplay {
        /// Counter persisted from the previous authentication.
        stored: u32,
        /// Counter reported by the authenticator in this assertion.
        reported: u32,
    },

    // ═══════════════════════════════════════════════════════════
    // Mismatch
    // ═══════════════════════════════════════════════════════════

    /// Challenge was issued for a different ceremony kind.
    #[error("WebAuthn challenge kind mismatch")]
    ChallengeKindMismatch,

    /// Authorization code was issued to a different client.
    #[error("Client id mismatch")]
    ClientMismatch,

    /// Redirect URI differs from the one bound to the code.
    #[error("Redirect URI mismatch")]
    RedirectUriMismatch,

    /// PKCE verifier does not reproduce the stored challenge.
    #[error("PKCE verification failed")]
    PkceMismatch,

    /// `OAuth` state parameter does not match (CSRF protection).
    #[error("OAuth state mismatch")]
    StateMismatch,

    /// `WebAuthn` origin mismatch (phishing protection).
    #[error("WebAuthn origin mismatch")]
    OriginMismatch,

    /// `WebAuthn` RP ID mismatch.
    #[error("WebAuthn RP ID mismatch")]
    RpIdMismatch,

    /// Credential belongs to a different user than the challenge was bound to.
    #[error("Credential does not belong to the challenged user")]
    CredentialUserMismatch,

    // ═══════════════════════════════════════════════════════════
    // Upstream
    // ═══════════════════════════════════════════════════════════

    /// Persistence service or key/value store is unreachable.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    // ═══════════════════════════════════════════════════════════
    // Invalid input
    // ═══════════════════════════════════════════════════════════

    /// Request is malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// PKCE code verifier has the wrong length or charset.
    #[error("Invalid PKCE code verifier")]
    InvalidCodeVerifier,

    /// Cryptographic verification of a ceremony response failed.
    #[error("WebAuthn verification failed: {0}")]
    VerificationFailed(String),

    /// Credential not found in the persistence service.
    #[error("Credential not found")]
    CredentialNotFound,

    /// User not found in the persistence service.
    #[error("User not found")]
    UserNotFound,

    /// Bearer token or session is invalid or expired.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// No credential was presented but authentication is required.
    #[error("Authentication required")]
    Unauthenticated,

    // ═══════════════════════════════════════════════════════════
    // Rate limiting
    // ═══════════════════════════════════════════════════════════

    /// Too many requests in the current window.
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Time until the current window closes.
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// Stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error (should not be exposed to users).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Classify this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::ChallengeExpired | Self::CodeExpired | Self::StateExpired => {
                ErrorCategory::Expired
            }
            Self::ChallengeNotFound | Self::CodeNotFound | Self::CounterReplay { .. } => {
                ErrorCategory::Replay
            }
            Self::ChallengeKindMismatch
            | Self::ClientMismatch
            | Self::RedirectUriMismatch
            | Self::PkceMismatch
            | Self::StateMismatch
            | Self::OriginMismatch
            | Self::RpIdMismatch
            | Self::CredentialUserMismatch => ErrorCategory::Mismatch,
            Self::UpstreamUnavailable(_) => ErrorCategory::Upstream,
            Self::InvalidRequest(_)
            | Self::InvalidCodeVerifier
            | Self::VerificationFailed(_)
            | Self::CredentialNotFound
            | Self::UserNotFound
            | Self::InvalidToken(_)
            | Self::Unauthenticated => ErrorCategory::Invalid,
            Self::TooManyRequests { .. } => ErrorCategory::RateLimited,
            Self::Serialization(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable error code for API response bodies.
    ///
    /// # Examples
    ///
    /// ```
    /// # use passgate_auth::AuthError;
    /// assert_eq!(AuthError::RedirectUriMismatch.error_code(), "invalid_grant");
    /// assert_eq!(AuthError::Unauthenticated.error_code(), "unauthenticated");
    /// ```
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::ChallengeExpired => "expired_challenge",
            Self::ChallengeNotFound | Self::ChallengeKindMismatch => "invalid_challenge",
            Self::CodeExpired
            | Self::CodeNotFound
            | Self::ClientMismatch
            | Self::RedirectUriMismatch
            | Self::PkceMismatch => "invalid_grant",
            Self::StateExpired | Self::StateMismatch => "invalid_state",
            Self::CounterReplay { .. } => "credential_replay",
            Self::OriginMismatch | Self::RpIdMismatch => "origin_mismatch",
            Self::CredentialUserMismatch | Self::VerificationFailed(_) => "verification_failed",
            Self::UpstreamUnavailable(_) => "temporarily_unavailable",
            Self::InvalidRequest(_) | Self::InvalidCodeVerifier => "invalid_request",
            Self::CredentialNotFound => "credential_not_found",
            Self::UserNotFound => "user_not_found",
            Self::InvalidToken(_) => "invalid_token",
            Self::Unauthenticated => "unauthenticated",
            Self::TooManyRequests { .. } => "rate_limited",
            Self::Serialization(_) | Self::Internal(_) => "server_error",
        }
    }

    /// Returns `true` if this error indicates a security issue.
    ///
    /// Security failures are logged separately from user errors.
    ///
    /// # Examples
    ///
    /// ```
    /// # use passgate_auth::AuthError;
    /// assert!(AuthError::OriginMismatch.is_security_issue());
    /// assert!(!AuthError::ChallengeExpired.is_security_issue());
    /// ```
    #[must_use]
    pub const fn is_security_issue(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Mismatch | ErrorCategory::Replay
        )
    }

    /// Returns `true` if this error is recoverable by re-issuing state.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self.category(), ErrorCategory::Expired)
    }

    /// HTTP status code appropriate for an API response.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Expired
            | ErrorCategory::Replay
            | ErrorCategory::Mismatch
            | ErrorCategory::Invalid => match self {
                Self::Unauthenticated | Self::InvalidToken(_) => 401,
                _ => 400,
            },
            ErrorCategory::RateLimited => 429,
            ErrorCategory::Upstream => 503,
            ErrorCategory::Internal => 500,
        }
    }
}

impl From<redis::RedisError> for AuthError {
    fn from(err: redis::RedisError) -> Self {
        Self::UpstreamUnavailable(format!("redis: {err}"))
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::UpstreamUnavailable(format!("backend: {err}"))
    }
}

impl From<bincode::Error> for AuthError {
    fn from(err: bincode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
