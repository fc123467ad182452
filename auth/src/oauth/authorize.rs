//! Authorization request builder (client side of the redirect flow).
//!
//! # Flow
//!
//! 1. [`OAuthClient::begin`] returns the provider URL and a
//!    [`PendingAuthorization`] holding `state` and the PKCE verifier.
//!    The application keeps the pending record server-side (or in an
//!    encrypted cookie) keyed to the browser.
//! 2. The provider redirects back with `code` and `state`.
//! 3. [`PendingAuthorization::complete`] checks expiry and compares `state`
//!    in constant time, releasing the verifier for the code exchange.

use super::pkce;
use crate::config::{OAuthConfig, deadline};
use crate::constants::pkce::METHOD_S256;
use crate::error::{AuthError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authorization attempt awaiting the provider redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    /// Anti-CSRF state sent with the request.
    pub state: String,

    /// PKCE verifier, presented only at code exchange.
    pub code_verifier: String,

    /// Start time.
    pub created_at: DateTime<Utc>,

    /// Hard expiry.
    pub expires_at: DateTime<Utc>,
}

impl PendingAuthorization {
    /// Validate the `state` returned by the provider and release the verifier.
    ///
    /// # Errors
    ///
    /// - `AuthError::StateExpired` if the attempt is past its expiry
    /// - `AuthError::StateMismatch` if `received_state` differs (CSRF)
    pub fn complete(self, received_state: &str) -> Result<String> {
        if Utc::now() >= self.expires_at {
            tracing::info!("OAuth authorization attempt expired");
            return Err(AuthError::StateExpired);
        }

        if !pkce::verify_state(received_state, &self.state) {
            tracing::warn!(security_event = true, "OAuth state mismatch (possible CSRF)");
            return Err(AuthError::StateMismatch);
        }

        Ok(self.code_verifier)
    }
}

/// OAuth client registration at a provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Provider authorization endpoint.
    pub authorization_endpoint: String,

    /// Client id issued by the provider.
    pub client_id: String,

    /// Registered redirect URI.
    pub redirect_uri: String,

    /// Requested scopes.
    pub scopes: Vec<String>,

    /// Lifetimes.
    pub config: OAuthConfig,
}

impl OAuthClient {
    /// Create a client with the default `openid email profile` scopes.
    #[must_use]
    pub fn new(
        authorization_endpoint: impl Into<String>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            authorization_endpoint: authorization_endpoint.into(),
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
            config: OAuthConfig::default(),
        }
    }

    /// Replace the requested scopes.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the lifetimes.
    #[must_use]
    pub fn with_config(mut self, config: OAuthConfig) -> Self {
        self.config = config;
        self
    }

    /// Start an authorization attempt.
    ///
    /// # Returns
    ///
    /// The provider URL to redirect the browser to, and the pending record.
    ///
    /// # Errors
    ///
    /// Returns error if the query string cannot be encoded.
    pub fn begin(&self) -> Result<(String, PendingAuthorization)> {
        let state = pkce::generate_state();
        let pair = pkce::generate_pair();
        let scope = self.scopes.join(" ");

        let params = [
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope.as_str()),
            ("state", state.as_str()),
            ("code_challenge", pair.code_challenge.as_str()),
            ("code_challenge_method", METHOD_S256),
        ];

        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Internal(format!("Failed to build URL: {e}")))?;

        let separator = if self.authorization_endpoint.contains('?') { '&' } else { '?' };
        let url = format!("{}{separator}{query}", self.authorization_endpoint);

        let now = Utc::now();
        let pending = PendingAuthorization {
            state,
            code_verifier: pair.code_verifier,
            created_at: now,
            expires_at: deadline(now, self.config.state_ttl, "authorization state TTL")?,
        };

        tracing::info!(client_id = %self.client_id, "Started OAuth authorization");

        Ok((url, pending))
    }

    /// Form body for the token endpoint (`grant_type=authorization_code`).
    #[must_use]
    pub fn token_request_form<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> [(&'static str, &'a str); 5] {
        [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("client_id", self.client_id.as_str()),
            ("code_verifier", code_verifier),
        ]
    }
}
