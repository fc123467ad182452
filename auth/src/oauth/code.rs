//! One-time authorization codes (server side of the code grant).
//!
//! # Storage
//!
//! Codes are never stored in the clear: the record lives under
//! `{prefix}{sha256(code)}`, so a leaked store dump cannot be replayed.
//!
//! # Single use
//!
//! [`AuthorizationCodeStore::validate_and_consume`] takes the record out of
//! the store atomically *before* validating it. Any exchange attempt burns
//! the code, successful or not: a wrong redirect URI, client id, or verifier
//! cannot be retried against the same code.

use super::pkce;
use crate::config::deadline;
use crate::constants::{entropy, keys};
use crate::crypto;
use crate::error::{AuthError, Result};
use crate::providers::KeyValueStore;
use crate::state::UserId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Grant context to bind to a new code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantRequest {
    /// Client the code is issued to.
    pub client_id: String,

    /// Authorizing user.
    pub user_id: UserId,

    /// Redirect URI; must be presented verbatim at exchange.
    pub redirect_uri: String,

    /// Granted scope (space separated).
    pub scope: String,

    /// PKCE `S256` challenge from the authorization request.
    pub code_challenge: Option<String>,
}

/// Stored grant, returned on successful exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGrant {
    /// Client the code was issued to.
    pub client_id: String,

    /// Authorizing user.
    pub user_id: UserId,

    /// Redirect URI bound to the code.
    pub redirect_uri: String,

    /// Granted scope.
    pub scope: String,

    /// PKCE challenge, if the request used PKCE.
    pub code_challenge: Option<String>,

    /// PKCE method (`S256`) when a challenge is present.
    pub code_challenge_method: Option<String>,

    /// Issue time.
    pub created_at: DateTime<Utc>,

    /// Hard expiry (issue + 10 minutes by default).
    pub expires_at: DateTime<Utc>,
}

/// Authorization code store over a [`KeyValueStore`].
#[derive(Debug, Clone)]
pub struct AuthorizationCodeStore<K> {
    store: K,
    ttl: Duration,
}

impl<K: KeyValueStore> AuthorizationCodeStore<K> {
    /// Create a code store.
    #[must_use]
    pub const fn new(store: K, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(code: &str) -> String {
        format!(
            "{}{}",
            keys::AUTHORIZATION_CODE_PREFIX,
            crypto::sha256_base64url(code)
        )
    }

    /// Issue a code for a grant.
    ///
    /// # Returns
    ///
    /// The code to hand to the client in the redirect.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if the PKCE challenge is not a valid `S256` value
    /// - `AuthError::UpstreamUnavailable` if the store is unreachable
    pub async fn create(&self, request: GrantRequest) -> Result<String> {
        if let Some(challenge) = &request.code_challenge {
            let decodes_to_digest = crypto::base64url_decode(challenge).is_some_and(|d| d.len() == 32);
            if !decodes_to_digest {
                return Err(AuthError::InvalidRequest(
                    "code_challenge must be base64url(SHA-256)".into(),
                ));
            }
        }

        let ttl = self
            .ttl
            .to_std()
            .ok()
            .filter(|ttl| !ttl.is_zero())
            .ok_or_else(|| AuthError::Internal("authorization code TTL must be positive".into()))?;

        let now = Utc::now();
        let code_challenge_method = request
            .code_challenge
            .as_ref()
            .map(|_| crate::constants::pkce::METHOD_S256.to_string());
        let grant = AuthorizationGrant {
            client_id: request.client_id,
            user_id: request.user_id,
            redirect_uri: request.redirect_uri,
            scope: request.scope,
            code_challenge: request.code_challenge,
            code_challenge_method,
            created_at: now,
            expires_at: deadline(now, self.ttl, "authorization code TTL")?,
        };

        let code = crypto::random_token(entropy::AUTHORIZATION_CODE_BYTES);
        let bytes = bincode::serialize(&grant)?;
        self.store.put_with_ttl(&Self::key(&code), bytes, ttl).await?;

        tracing::info!(
            client_id = %grant.client_id,
            user_id = %grant.user_id,
            pkce = grant.code_challenge.is_some(),
            "Issued authorization code"
        );

        Ok(code)
    }

    /// Exchange a code: consume it, then validate the exchange request.
    ///
    /// # Errors
    ///
    /// - `AuthError::CodeNotFound` if unknown or already used
    /// - `AuthError::CodeExpired` if past its expiry
    /// - `AuthError::ClientMismatch` / `AuthError::RedirectUriMismatch` on binding mismatch
    /// - `AuthError::InvalidCodeVerifier` if the verifier is malformed
    /// - `AuthError::PkceMismatch` if the verifier is missing, wrong, or
    ///   supplied for a code issued without PKCE
    pub async fn validate_and_consume(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
        code_verifier: Option<&str>,
    ) -> Result<AuthorizationGrant> {
        let Some(bytes) = self.store.take(&Self::key(code)).await? else {
            tracing::warn!(client_id = %client_id, "Authorization code not found or already used");
            return Err(AuthError::CodeNotFound);
        };

        let grant: AuthorizationGrant = bincode::deserialize(&bytes)?;

        if Utc::now() >= grant.expires_at {
            tracing::info!(client_id = %client_id, "Authorization code expired");
            return Err(AuthError::CodeExpired);
        }

        if grant.client_id != client_id {
            tracing::warn!(
                expected = %grant.client_id,
                presented = %client_id,
                security_event = true,
                "Authorization code presented by another client"
            );
            return Err(AuthError::ClientMismatch);
        }

        if grant.redirect_uri != redirect_uri {
            tracing::warn!(
                client_id = %client_id,
                presented = %redirect_uri,
                security_event = true,
                "Authorization code redirect URI mismatch"
            );
            return Err(AuthError::RedirectUriMismatch);
        }

        match (&grant.code_challenge, code_verifier) {
            (Some(challenge), Some(verifier)) => {
                pkce::validate_verifier(verifier)?;
                if !pkce::verify_challenge(verifier, challenge) {
                    tracing::warn!(client_id = %client_id, security_event = true, "PKCE verification failed");
                    return Err(AuthError::PkceMismatch);
                }
            }
            (Some(_), None) => {
                tracing::warn!(client_id = %client_id, security_event = true, "PKCE verifier missing");
                return Err(AuthError::PkceMismatch);
            }
            (None, Some(_)) => {
                tracing::warn!(
                    client_id = %client_id,
                    security_event = true,
                    "PKCE verifier supplied for a code issued without PKCE"
                );
                return Err(AuthError::PkceMismatch);
            }
            (None, None) => {}
        }

        tracing::info!(
            client_id = %client_id,
            user_id = %grant.user_id,
            "Authorization code exchanged"
        );

        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::MemoryStore;

    fn store() -> AuthorizationCodeStore<MemoryStore> {
        AuthorizationCodeStore::new(MemoryStore::new(), Duration::minutes(10))
    }

    fn request(code_challenge: Option<String>) -> GrantRequest {
        GrantRequest {
            client_id: "c1".into(),
            user_id: UserId::new("u1"),
            redirect_uri: "https://app/cb".into(),
            scope: "openid".into(),
            code_challenge,
        }
    }

    #[tokio::test]
    async fn test_exchange_with_pkce() {
        let store = store();
        let pair = pkce::generate_pair();
        let code = store.create(request(Some(pair.code_challenge.clone()))).await.unwrap();

        let grant = store
            .validate_and_consume(&code, "c1", "https://app/cb", Some(&pair.code_verifier))
            .await
            .unwrap();

        assert_eq!(grant.user_id, UserId::new("u1"));
        assert_eq!(grant.code_challenge_method.as_deref(), Some("S256"));
        assert_eq!(grant.expires_at - grant.created_at, Duration::minutes(10));
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let store = store();
        let code = store.create(request(None)).await.unwrap();

        assert!(store.validate_and_consume(&code, "c1", "https://app/cb", None).await.is_ok());
        assert_eq!(
            store.validate_and_consume(&code, "c1", "https://app/cb", None).await,
            Err(AuthError::CodeNotFound)
        );
    }

    #[tokio::test]
    async fn test_wrong_verifier_burns_code() {
        let store = store();
        let pair = pkce::generate_pair();
        let code = store.create(request(Some(pair.code_challenge))).await.unwrap();
        let other = pkce::generate_pair();

        assert_eq!(
            store
                .validate_and_consume(&code, "c1", "https://app/cb", Some(&other.code_verifier))
                .await,
            Err(AuthError::PkceMismatch)
        );
        assert_eq!(
            store
                .validate_and_consume(&code, "c1", "https://app/cb", Some(&pair.code_verifier))
                .await,
            Err(AuthError::CodeNotFound)
        );
    }

    #[tokio::test]
    async fn test_missing_and_unexpected_verifier() {
        let store = store();
        let pair = pkce::generate_pair();

        let code = store.create(request(Some(pair.code_challenge))).await.unwrap();
        assert_eq!(
            store.validate_and_consume(&code, "c1", "https://app/cb", None).await,
            Err(AuthError::PkceMismatch)
        );

        let code = store.create(request(None)).await.unwrap();
        assert_eq!(
            store
                .validate_and_consume(&code, "c1", "https://app/cb", Some(&pair.code_verifier))
                .await,
            Err(AuthError::PkceMismatch)
        );
    }

    #[tokio::test]
    async fn test_wrong_client_rejected() {
        let store = store();
        let code = store.create(request(None)).await.unwrap();
        assert_eq!(
            store.validate_and_consume(&code, "c2", "https://app/cb", None).await,
            Err(AuthError::ClientMismatch)
        );
    }

    #[tokio::test]
    async fn test_malformed_challenge_rejected_at_issue() {
        let store = store();
        let result = store.create(request(Some("short".into()))).await;
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_rejected() {
        let store = AuthorizationCodeStore::new(MemoryStore::new(), Duration::MAX);
        let result = store.create(request(None)).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn test_code_not_stored_in_clear() {
        let kv = MemoryStore::new();
        let store = AuthorizationCodeStore::new(kv.clone(), Duration::minutes(10));
        let code = store.create(request(None)).await.unwrap();

        let raw_key = format!("{}{code}", keys::AUTHORIZATION_CODE_PREFIX);
        assert_eq!(kv.get(&raw_key).await.unwrap(), None);
        assert!(kv.get(&AuthorizationCodeStore::<MemoryStore>::key(&code)).await.unwrap().is_some());
    }
}
