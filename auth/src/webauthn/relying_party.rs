//! Relying party derivation.
//!
//! The RP id and origin are computed from the request on every ceremony
//! step, by the same function, so option generation and verification can
//! never disagree.

use crate::config::PasskeyConfig;
use crate::error::{AuthError, Result};
use http::HeaderMap;
use http::header::HOST;

/// Relying party for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelyingParty {
    /// RP id (host without port, or the configured override).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Expected origin (`scheme://host[:port]`).
    pub origin: String,
}

impl RelyingParty {
    /// Derive the relying party from the request host and scheme.
    ///
    /// # Arguments
    ///
    /// * `host` - `Host` header value, port included if present
    /// * `scheme` - `https`, or `http` for `localhost` development
    /// * `config` - Passkey configuration (name, optional RP id override)
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidRequest` if the host is empty or the scheme is
    ///   not usable for `WebAuthn`
    /// - `AuthError::RpIdMismatch` if an override is configured and the
    ///   request host is not that domain or a subdomain of it
    ///
    /// # Examples
    ///
    /// ```
    /// use passgate_auth::config::PasskeyConfig;
    /// use passgate_auth::webauthn::RelyingParty;
    ///
    /// let rp = RelyingParty::for_request("app.example.com", "https", &PasskeyConfig::default()).unwrap();
    /// assert_eq!(rp.id, "app.example.com");
    /// assert_eq!(rp.origin, "https://app.example.com");
    /// ```
    pub fn for_request(host: &str, scheme: &str, config: &PasskeyConfig) -> Result<Self> {
        let host = host.trim().to_ascii_lowercase();
        let hostname = strip_port(&host);
        if hostname.is_empty() {
            return Err(AuthError::InvalidRequest("missing request host".into()));
        }

        match scheme {
            "https" => {}
            "http" if is_loopback(hostname) => {}
            _ => {
                return Err(AuthError::InvalidRequest(format!(
                    "scheme {scheme} not allowed for host {hostname}"
                )));
            }
        }

        let id = match &config.rp_id_override {
            Some(rp_id) => {
                let rp_id = rp_id.to_ascii_lowercase();
                if !host_within(hostname, &rp_id) {
                    tracing::warn!(
                        host = %hostname,
                        rp_id = %rp_id,
                        security_event = true,
                        "Request host outside configured RP id"
                    );
                    return Err(AuthError::RpIdMismatch);
                }
                rp_id
            }
            None => hostname.to_string(),
        };

        Ok(Self {
            id,
            name: config.rp_name.clone(),
            origin: format!("{scheme}://{host}"),
        })
    }

    /// Derive the relying party from request headers.
    ///
    /// Honors `X-Forwarded-Host` / `X-Forwarded-Proto` when set by a trusted
    /// proxy, falling back to `Host` and `default_scheme`.
    ///
    /// # Errors
    ///
    /// Same as [`RelyingParty::for_request`].
    pub fn from_headers(
        headers: &HeaderMap,
        default_scheme: &str,
        config: &PasskeyConfig,
    ) -> Result<Self> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let host = header("x-forwarded-host")
            .or_else(|| header(HOST.as_str()))
            .ok_or_else(|| AuthError::InvalidRequest("missing Host header".into()))?;
        let scheme = header("x-forwarded-proto").unwrap_or(default_scheme);

        Self::for_request(host, scheme, config)
    }
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // IPv6 literal: [::1]:8080
        return rest.split(']').next().unwrap_or_default();
    }
    host.split(':').next().unwrap_or_default()
}

fn is_loopback(hostname: &str) -> bool {
    matches!(hostname, "localhost" | "127.0.0.1" | "::1") || hostname.ends_with(".localhost")
}

fn host_within(hostname: &str, rp_id: &str) -> bool {
    hostname == rp_id
        || hostname
            .strip_suffix(rp_id)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
