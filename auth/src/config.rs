//! Authentication configuration.
//!
//! This module provides configuration structures for every component of the
//! core. Configuration values should be provided by the application, not
//! hardcoded; the defaults match the ceremony and grant lifetimes the
//! protocols assume.

use crate::constants::{cose, http, keys, ttl};
use crate::error::{AuthError, Result};
use crate::webauthn::options::{AuthenticatorAttachment, ResidentKeyRequirement, UserVerification};
use chrono::{DateTime, Duration, Utc};

/// `now + ttl`, failing instead of overflowing for out-of-range lifetimes.
pub(crate) fn deadline(now: DateTime<Utc>, ttl: Duration, what: &str) -> Result<DateTime<Utc>> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Internal(format!("{what} is out of range")))
}

/// WebAuthn/Passkey ceremony configuration.
#[derive(Debug, Clone)]
pub struct PasskeyConfig {
    /// Human-readable relying party name shown by authenticators.
    pub rp_name: String,

    /// Fixed RP id used instead of the request hostname.
    ///
    /// Applies to both option generation and verification. Useful when the
    /// app is served from a subdomain but credentials should be scoped to the
    /// registrable parent domain.
    pub rp_id_override: Option<String>,

    /// Challenge time-to-live.
    ///
    /// Default: 5 minutes
    pub challenge_ttl: Duration,

    /// Client-side ceremony timeout hint, in milliseconds.
    ///
    /// Default: 60 000
    pub timeout_ms: u32,

    /// Discoverable (resident) credential preference.
    pub resident_key: ResidentKeyRequirement,

    /// User verification preference.
    pub user_verification: UserVerification,

    /// Authenticator attachment preference (`None` allows any).
    pub attachment: Option<AuthenticatorAttachment>,

    /// COSE algorithms offered at registration, in preference order.
    pub algorithms: Vec<i64>,
}

impl PasskeyConfig {
    /// Create new Passkey configuration.
    ///
    /// # Arguments
    ///
    /// * `rp_name` - Relying party display name (e.g., "Example App")
    #[must_use]
    pub fn new(rp_name: impl Into<String>) -> Self {
        Self {
            rp_name: rp_name.into(),
            ..Self::default()
        }
    }

    /// Pin the RP id instead of deriving it from the request host.
    #[must_use]
    pub fn with_rp_id_override(mut self, rp_id: impl Into<String>) -> Self {
        self.rp_id_override = Some(rp_id.into());
        self
    }

    /// Set challenge time-to-live.
    #[must_use]
    pub const fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    /// Set the client-side ceremony timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set the authenticator attachment preference.
    #[must_use]
    pub const fn with_attachment(mut self, attachment: Option<AuthenticatorAttachment>) -> Self {
        self.attachment = attachment;
        self
    }

    /// Set the resident key preference.
    #[must_use]
    pub const fn with_resident_key(mut self, resident_key: ResidentKeyRequirement) -> Self {
        self.resident_key = resident_key;
        self
    }
}

impl Default for PasskeyConfig {
    fn default() -> Self {
        Self {
            rp_name: "Passgate".to_string(),
            rp_id_override: None,
            challenge_ttl: Duration::seconds(ttl::CHALLENGE_SECS),
            timeout_ms: 60_000,
            resident_key: ResidentKeyRequirement::Required,
            user_verification: UserVerification::Preferred,
            attachment: Some(AuthenticatorAttachment::Platform),
            algorithms: vec![cose::ES256, cose::EDDSA, cose::RS256],
        }
    }
}

/// `OAuth2` grant configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Authorization code time-to-live.
    ///
    /// Default: 10 minutes
    pub code_ttl: Duration,

    /// Pending authorization (state + PKCE verifier) time-to-live.
    ///
    /// Default: 10 minutes
    pub state_ttl: Duration,
}

impl OAuthConfig {
    /// Set authorization code time-to-live.
    #[must_use]
    pub const fn with_code_ttl(mut self, ttl: Duration) -> Self {
        self.code_ttl = ttl;
        self
    }

    /// Set pending authorization time-to-live.
    #[must_use]
    pub const fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = ttl;
        self
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::seconds(ttl::AUTHORIZATION_CODE_SECS),
            state_ttl: Duration::seconds(ttl::OAUTH_STATE_SECS),
        }
    }
}

/// Signing key lifecycle configuration.
#[derive(Debug, Clone)]
pub struct KeyManagerConfig {
    /// Age after which the current keyset is replaced.
    ///
    /// Default: 30 days
    pub rotation_interval: Duration,

    /// How long a superseded public key remains published.
    ///
    /// Default: 7 days
    pub grace_period: Duration,

    /// Key/value store key holding the persisted keyset.
    pub storage_key: String,

    /// Longest a cached keyset is served before the store is re-read, so
    /// rotations made by other instances are adopted.
    ///
    /// Default: 30 seconds. Capped at half the grace period.
    pub refresh_interval: Duration,
}

impl KeyManagerConfig {
    /// Set rotation interval.
    #[must_use]
    pub const fn with_rotation_interval(mut self, interval: Duration) -> Self {
        self.rotation_interval = interval;
        self
    }

    /// Set the grace period for superseded keys.
    #[must_use]
    pub const fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Set the storage key.
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the store re-read interval.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Re-read interval actually used: a superseded key must still be in
    /// its grace window when lagging instances notice the rotation.
    #[must_use]
    pub fn effective_refresh_interval(&self) -> Duration {
        self.refresh_interval.min(self.grace_period / 2)
    }
}

impl Default for KeyManagerConfig {
    fn default() -> Self {
        Self {
            rotation_interval: Duration::days(ttl::KEYSET_ROTATION_DAYS),
            grace_period: Duration::days(ttl::KEYSET_GRACE_DAYS),
            storage_key: keys::KEYSET.to_string(),
            refresh_interval: Duration::seconds(ttl::KEYSET_REFRESH_SECS),
        }
    }
}

/// Fixed-window rate limit policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Window length.
    pub window: std::time::Duration,

    /// Requests allowed per window.
    pub max_requests: u32,
}

impl RateLimitPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(window: std::time::Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }

    /// `max_requests` per minute.
    #[must_use]
    pub const fn per_minute(max_requests: u32) -> Self {
        Self::new(std::time::Duration::from_secs(60), max_requests)
    }

    /// `max_requests` per hour.
    #[must_use]
    pub const fn per_hour(max_requests: u32) -> Self {
        Self::new(std::time::Duration::from_secs(3600), max_requests)
    }
}

/// Request authentication resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Name of the session cookie.
    pub session_cookie_name: String,

    /// Remaining lifetime under which `needs_refresh` is set.
    ///
    /// Default: 15 minutes
    pub refresh_threshold: Duration,

    /// Interactive login page that browser callers are redirected to.
    pub login_path: String,

    /// Path prefix that marks a request as programmatic.
    pub api_prefix: String,

    /// Emit the `Secure` attribute on session cookies.
    ///
    /// Only disable for plain-http local development.
    pub secure_cookies: bool,
}

impl ResolverConfig {
    /// Set the session cookie name.
    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.session_cookie_name = name.into();
        self
    }

    /// Set the refresh threshold.
    #[must_use]
    pub const fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    /// Set the login page path.
    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Set the API path prefix.
    #[must_use]
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    /// Toggle the `Secure` cookie attribute.
    #[must_use]
    pub const fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: http::SESSION_COOKIE.to_string(),
            refresh_threshold: Duration::minutes(ttl::REFRESH_THRESHOLD_MINS),
            login_path: "/login".to_string(),
            api_prefix: "/api/".to_string(),
            secure_cookies: true,
        }
    }
}

/// Background sweep of expired in-memory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// Time between sweeps.
    ///
    /// Default: 60 seconds. Clamped to (0, 60 s] by
    /// [`SweeperConfig::effective_interval`].
    pub interval: std::time::Duration,
}

impl SweeperConfig {
    /// Set the sweep interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: std::time::Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Interval actually used: at least one millisecond, at most a minute.
    #[must_use]
    pub fn effective_interval(&self) -> std::time::Duration {
        self.interval.clamp(
            std::time::Duration::from_millis(ttl::MIN_SWEEP_INTERVAL_MILLIS),
            std::time::Duration::from_secs(ttl::MAX_SWEEP_INTERVAL_SECS),
        )
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: std::time::Duration::from_secs(ttl::SWEEP_INTERVAL_SECS),
        }
    }
}
