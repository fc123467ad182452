//! Authentication constants.
//!
//! This module contains constant values used throughout the authentication core.

/// Time-to-live values.
pub mod ttl {
    /// `WebAuthn` ceremony challenge lifetime, in seconds.
    pub const CHALLENGE_SECS: i64 = 5 * 60;

    /// Authorization code lifetime, in seconds.
    pub const AUTHORIZATION_CODE_SECS: i64 = 10 * 60;

    /// Pending `OAuth` authorization (state + verifier) lifetime, in seconds.
    pub const OAUTH_STATE_SECS: i64 = 10 * 60;

    /// Signing keyset rotation interval, in days.
    pub const KEYSET_ROTATION_DAYS: i64 = 30;

    /// How long a superseded public key stays in the published set, in days.
    pub const KEYSET_GRACE_DAYS: i64 = 7;

    /// Default threshold under which a credential is flagged for refresh, in minutes.
    pub const REFRESH_THRESHOLD_MINS: i64 = 15;

    /// Interval of the background expired-entry sweep, in seconds.
    pub const SWEEP_INTERVAL_SECS: u64 = 60;

    /// Longest accepted sweep interval, in seconds.
    pub const MAX_SWEEP_INTERVAL_SECS: u64 = 60;

    /// Shortest accepted sweep interval, in milliseconds.
    pub const MIN_SWEEP_INTERVAL_MILLIS: u64 = 1;

    /// Longest a key manager serves its cached keyset without re-reading
    /// the store, in seconds.
    pub const KEYSET_REFRESH_SECS: i64 = 30;
}

/// Key prefixes used in the key/value store.
pub mod keys {
    /// `WebAuthn` challenge records: `{prefix}{challenge_id}`.
    pub const CHALLENGE_PREFIX: &str = "passgate:challenge:";

    /// Authorization code records: `{prefix}{sha256(code)}`.
    pub const AUTHORIZATION_CODE_PREFIX: &str = "passgate:code:";

    /// Rate-limit counters: `{prefix}{identifier}:{window_start_ms}`.
    pub const RATE_LIMIT_PREFIX: &str = "passgate:ratelimit:";

    /// Current signing keyset.
    pub const KEYSET: &str = "passgate:jwks:current";
}

/// Random value sizes, in bytes, before encoding.
pub mod entropy {
    /// `WebAuthn` challenge value.
    pub const CHALLENGE_BYTES: usize = 32;

    /// `OAuth` state token.
    pub const STATE_BYTES: usize = 32;

    /// PKCE code verifier.
    pub const VERIFIER_BYTES: usize = 32;

    /// Authorization code.
    pub const AUTHORIZATION_CODE_BYTES: usize = 32;
}

/// Cookie and header names.
pub mod http {
    /// Default session cookie name.
    pub const SESSION_COOKIE: &str = "session";

    /// Bearer scheme prefix in the `Authorization` header.
    pub const BEARER_PREFIX: &str = "Bearer ";
}

/// PKCE parameters (RFC 7636).
pub mod pkce {
    /// The only supported challenge method.
    pub const METHOD_S256: &str = "S256";

    /// Minimum code verifier length.
    pub const VERIFIER_MIN_LEN: usize = 43;

    /// Maximum code verifier length.
    pub const VERIFIER_MAX_LEN: usize = 128;
}

/// COSE algorithm identifiers offered in registration options.
pub mod cose {
    /// ECDSA w/ SHA-256.
    pub const ES256: i64 = -7;

    /// `EdDSA`.
    pub const EDDSA: i64 = -8;

    /// RSASSA-PKCS1-v1_5 w/ SHA-256.
    pub const RS256: i64 = -257;
}
