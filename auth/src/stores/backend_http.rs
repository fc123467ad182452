//! HTTP client for the persistence service ("backend API").
//!
//! Implements the user, credential, token, and session collaborator traits
//! over an authenticated HTTPS channel (bearer API key).
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |---|---|
//! | user by id | `GET {base}/users/{id}` |
//! | user by email | `GET {base}/users?email={email}` |
//! | list credentials | `GET {base}/users/{id}/credentials` |
//! | credential by id | `GET {base}/credentials/{id}` |
//! | create credential | `POST {base}/credentials` |
//! | record usage | `PATCH {base}/credentials/{id}/usage` |
//! | validate token | `POST {base}/tokens/validate` |
//! | validate session | `POST {base}/sessions/validate` |
//!
//! # Status mapping
//!
//! - network failure or `5xx` → [`AuthError::UpstreamUnavailable`]
//! - `404` → `None` on lookups, [`AuthError::CredentialNotFound`] on writes
//! - `401` on validation endpoints → `None`; elsewhere [`AuthError::InvalidToken`]

use crate::error::{AuthError, Result};
use crate::providers::{
    CredentialRecord, CredentialRepository, SessionValidator, TokenValidator, User,
    UserRepository, ValidatedIdentity,
};
use crate::state::{CredentialId, UserId};
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Persistence service client.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    /// HTTP client (connection pooled).
    http_client: Client,

    /// Base URL without trailing slash (e.g., `https://api.example.com/v1`).
    base_url: String,

    /// Service API key, sent as a bearer credential.
    api_key: String,
}

#[derive(Serialize)]
struct UsageUpdate {
    signature_counter: u32,
    used_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct TokenValidation<'a> {
    token: &'a str,
}

#[derive(Serialize)]
struct SessionValidation<'a> {
    session_id: &'a str,
}

impl HttpBackendClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Service base URL
    /// * `api_key` - Service API key
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built (TLS backend init).
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, api_key, Duration::from_secs(10))
    }

    /// Create a new client with a custom request timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built (TLS backend init).
    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn segment(value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.bearer_auth(&self.api_key).send().await?;

        if response.status().is_server_error() {
            let status = response.status();
            tracing::warn!(status = %status, "Persistence service returned server error");
            return Err(AuthError::UpstreamUnavailable(format!(
                "backend returned {status}"
            )));
        }

        Ok(response)
    }

    /// GET returning `None` on 404.
    async fn get_optional<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = self.send(request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(AuthError::InvalidToken(
                "backend rejected service credentials".into(),
            )),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(AuthError::InvalidRequest(format!(
                "backend returned {status}"
            ))),
        }
    }

    /// Validation POST returning `None` on 401/404.
    async fn validate<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<ValidatedIdentity>> {
        let response = self
            .send(self.http_client.post(self.url(path)).json(body))
            .await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(AuthError::InvalidRequest(format!(
                "backend returned {status}"
            ))),
        }
    }

    /// Write returning `CredentialNotFound` on 404.
    async fn write(&self, request: RequestBuilder) -> Result<()> {
        let response = self.send(request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(AuthError::CredentialNotFound),
            StatusCode::UNAUTHORIZED => Err(AuthError::InvalidToken(
                "backend rejected service credentials".into(),
            )),
            status if status.is_success() => Ok(()),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::error!(status = %status, body = %body, "Persistence service write failed");
                Err(AuthError::InvalidRequest(format!(
                    "backend returned {status}"
                )))
            }
        }
    }
}

impl UserRepository for HttpBackendClient {
    async fn find_user_by_id(&self, user_id: &UserId) -> Result<Option<User>> {
        let url = self.url(&format!("/users/{}", Self::segment(user_id.as_str())));
        self.get_optional(self.http_client.get(url)).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let request = self
            .http_client
            .get(self.url("/users"))
            .query(&[("email", email)]);
        self.get_optional(request).await
    }
}

impl CredentialRepository for HttpBackendClient {
    async fn list_credentials(&self, user_id: &UserId) -> Result<Vec<CredentialRecord>> {
        let url = self.url(&format!(
            "/users/{}/credentials",
            Self::segment(user_id.as_str())
        ));
        Ok(self
            .get_optional(self.http_client.get(url))
            .await?
            .unwrap_or_default())
    }

    async fn find_credential(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Option<CredentialRecord>> {
        let url = self.url(&format!(
            "/credentials/{}",
            Self::segment(credential_id.as_str())
        ));
        self.get_optional(self.http_client.get(url)).await
    }

    async fn create_credential(&self, credential: &CredentialRecord) -> Result<()> {
        self.write(self.http_client.post(self.url("/credentials")).json(credential))
            .await
    }

    async fn update_credential_usage(
        &self,
        credential_id: &CredentialId,
        signature_counter: u32,
        used_at: DateTime<Utc>,
    ) -> Result<()> {
        let url = self.url(&format!(
            "/credentials/{}/usage",
            Self::segment(credential_id.as_str())
        ));
        let body = UsageUpdate {
            signature_counter,
            used_at,
        };
        self.write(self.http_client.patch(url).json(&body)).await
    }
}

impl TokenValidator for HttpBackendClient {
    async fn validate_token(&self, token: &str) -> Result<Option<ValidatedIdentity>> {
        self.validate("/tokens/validate", &TokenValidation { token })
            .await
    }
}

impl SessionValidator for HttpBackendClient {
    async fn validate_session(&self, session_id: &str) -> Result<Option<ValidatedIdentity>> {
        self.validate("/sessions/validate", &SessionValidation { session_id })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpBackendClient::new("https://api.example.com/v1/", "key").unwrap();
        assert_eq!(client.url("/users"), "https://api.example.com/v1/users");
    }

    #[test]
    fn test_path_segments_are_encoded() {
        assert_eq!(HttpBackendClient::segment("a/b c"), "a%2Fb%20c");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_upstream_unavailable() {
        // Port 9 (discard) on localhost: connection refused.
        let client = HttpBackendClient::with_timeout(
            "http://127.0.0.1:9",
            "key",
            Duration::from_millis(500),
        )
        .unwrap();

        let err = client.find_user_by_id(&UserId::new("u1")).await.unwrap_err();
        assert!(matches!(err, AuthError::UpstreamUnavailable(_)));
        assert!(!err.is_security_issue());
    }
}
