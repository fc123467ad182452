//! Rejection presentation.
//!
//! Protocol failures stay values until the HTTP edge. There, an
//! [`AuthRejection`] picks the shape the caller can use: API callers get a
//! JSON body with a stable `error` code, browsers get a redirect to the
//! login page carrying the same code.

use super::request::ClientKind;
use crate::config::ResolverConfig;
use crate::error::{AuthError, ErrorCategory};
use http::StatusCode;
use serde::Serialize;
use std::fmt;

/// JSON error body for API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable code.
    pub error: &'static str,
    /// Human-readable description.
    pub error_description: String,
}

/// How a rejection is shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// Structured error for programmatic callers.
    Json {
        /// Response status.
        status: StatusCode,
        /// Stable error code.
        error: &'static str,
        /// Human-readable description.
        description: String,
    },
    /// Interactive redirect to the login page.
    Redirect {
        /// `Location` header value.
        location: String,
    },
}

/// A failed authentication, ready to be rendered.
#[derive(Debug)]
pub struct AuthRejection {
    presentation: Presentation,
    set_cookie: Option<String>,
    source: Option<anyhow::Error>,
}

impl AuthRejection {
    /// Build a rejection for `error`, shaped for `client`.
    ///
    /// `path` is the originally requested path; browsers are sent back there
    /// after logging in.
    #[must_use]
    pub fn new(error: &AuthError, client: ClientKind, path: &str, config: &ResolverConfig) -> Self {
        let presentation = match client {
            ClientKind::Api => Presentation::Json {
                status: StatusCode::from_u16(error.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                error: error.error_code(),
                description: public_description(error),
            },
            ClientKind::Browser => Presentation::Redirect {
                location: login_location(config, error.error_code(), path),
            },
        };

        Self {
            presentation,
            set_cookie: None,
            source: None,
        }
    }

    /// Attach a `Set-Cookie` value (usually clearing the session cookie).
    #[must_use]
    pub fn with_set_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookie = Some(cookie.into());
        self
    }

    /// Attach an internal cause, logged but never shown to the caller.
    #[must_use]
    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    /// Rendering shape.
    #[must_use]
    pub const fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// `Set-Cookie` value to send, if any.
    #[must_use]
    pub fn set_cookie(&self) -> Option<&str> {
        self.set_cookie.as_deref()
    }

    /// JSON body for API callers; `None` for redirects.
    #[must_use]
    pub fn body(&self) -> Option<ErrorBody> {
        match &self.presentation {
            Presentation::Json {
                error, description, ..
            } => Some(ErrorBody {
                error: *error,
                error_description: description.clone(),
            }),
            Presentation::Redirect { .. } => None,
        }
    }
}

/// Description safe to show: upstream and internal details are withheld.
fn public_description(error: &AuthError) -> String {
    match error.category() {
        ErrorCategory::Internal => "An internal error occurred".to_string(),
        ErrorCategory::Upstream => "Service temporarily unavailable".to_string(),
        _ => error.to_string(),
    }
}

/// `{login_path}?error=<code>&next=<path>`.
///
/// `next` is only carried for same-site absolute paths, so the login page
/// cannot be turned into an open redirect.
fn login_location(config: &ResolverConfig, code: &str, path: &str) -> String {
    let mut location = format!("{}?error={code}", config.login_path);
    let local = path.starts_with('/') && !path.starts_with("//") && !path.contains('\\');
    if local && path != config.login_path {
        location.push_str("&next=");
        location.push_str(&urlencoding::encode(path));
    }
    location
}

impl fmt::Display for AuthRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.presentation {
            Presentation::Json {
                status,
                error,
                description,
            } => write!(f, "[{status} {error}] {description}"),
            Presentation::Redirect { location } => write!(f, "redirect to {location}"),
        }
    }
}

impl std::error::Error for AuthRejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Unexpected failures become an opaque 500.
impl From<anyhow::Error> for AuthRejection {
    fn from(err: anyhow::Error) -> Self {
        Self {
            presentation: Presentation::Json {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "server_error",
                description: "An internal error occurred".to_string(),
            },
            set_cookie: None,
            source: Some(err),
        }
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AuthRejection {
    fn into_response(self) -> axum::response::Response {
        use axum::http::HeaderValue;
        use axum::http::header::SET_COOKIE;

        let mut response = match self.presentation {
            Presentation::Json {
                status,
                error,
                description,
            } => {
                if status.is_server_error() {
                    if let Some(source) = &self.source {
                        tracing::error!(status = %status, error = %source, "Internal server error");
                    } else {
                        tracing::error!(status = %status, "Internal server error");
                    }
                }
                let body = ErrorBody {
                    error,
                    error_description: description,
                };
                (status, axum::Json(body)).into_response()
            }
            Presentation::Redirect { location } => {
                axum::response::Redirect::to(&location).into_response()
            }
        };

        if let Some(cookie) = self.set_cookie {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().append(SET_COOKIE, value);
                }
                Err(e) => tracing::warn!(error = %e, "Dropping malformed Set-Cookie value"),
            }
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_gets_json() {
        let rejection = AuthRejection::new(
            &AuthError::Unauthenticated,
            ClientKind::Api,
            "/api/me",
            &ResolverConfig::default(),
        );

        assert_eq!(
            rejection.presentation(),
            &Presentation::Json {
                status: StatusCode::UNAUTHORIZED,
                error: "unauthenticated",
                description: "Authentication required".to_string(),
            }
        );
        let body = serde_json::to_value(rejection.body().unwrap()).unwrap();
        assert_eq!(body["error"], "unauthenticated");
        assert_eq!(body["error_description"], "Authentication required");
    }

    #[test]
    fn test_browser_gets_login_redirect() {
        let rejection = AuthRejection::new(
            &AuthError::Unauthenticated,
            ClientKind::Browser,
            "/settings/keys?tab=passkeys",
            &ResolverConfig::default(),
        );

        assert_eq!(
            rejection.presentation(),
            &Presentation::Redirect {
                location: "/login?error=unauthenticated&next=%2Fsettings%2Fkeys%3Ftab%3Dpasskeys"
                    .to_string()
            }
        );
        assert!(rejection.body().is_none());
    }

    #[test]
    fn test_next_rejects_foreign_targets() {
        let config = ResolverConfig::default();
        assert_eq!(
            login_location(&config, "unauthenticated", "//evil.example/x"),
            "/login?error=unauthenticated"
        );
        assert_eq!(
            login_location(&config, "unauthenticated", "https://evil.example/"),
            "/login?error=unauthenticated"
        );
    }

    #[test]
    fn test_internal_details_withheld() {
        let rejection = AuthRejection::new(
            &AuthError::UpstreamUnavailable("redis: connection refused at 10.0.0.4".into()),
            ClientKind::Api,
            "/api/me",
            &ResolverConfig::default(),
        );
        let body = rejection.body().unwrap();
        assert_eq!(body.error, "temporarily_unavailable");
        assert!(!body.error_description.contains("10.0.0.4"));
    }

    #[test]
    fn test_anyhow_source_is_kept() {
        use std::error::Error as _;

        let rejection = AuthRejection::from(anyhow::anyhow!("pool exhausted"));
        assert!(rejection.to_string().contains("server_error"));
        assert_eq!(rejection.source().unwrap().to_string(), "pool exhausted");
    }
}
