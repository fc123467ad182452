//! Request shape inspection.

use crate::config::ResolverConfig;
use crate::constants::http::BEARER_PREFIX;
use http::HeaderMap;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

/// Who is calling: decides between a JSON error and a login redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKind {
    /// Programmatic caller (mobile app, SPA fetch, API client).
    Api,
    /// Interactive page load.
    Browser,
}

fn header<'a>(headers: &'a HeaderMap, name: http::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Classify a request.
///
/// Rules, first match wins:
/// 1. Path under the API prefix → `Api`
/// 2. `Authorization` header present → `Api`
/// 3. `X-Requested-With: XMLHttpRequest` → `Api`
/// 4. JSON `Content-Type` → `Api`
/// 5. `Accept` names `text/html` → `Browser`
/// 6. `Accept` names JSON → `Api`
/// 7. Otherwise → `Browser`
#[must_use]
pub fn classify(path: &str, headers: &HeaderMap, config: &ResolverConfig) -> ClientKind {
    if path.starts_with(&config.api_prefix) {
        return ClientKind::Api;
    }
    if headers.contains_key(AUTHORIZATION) {
        return ClientKind::Api;
    }
    if headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    {
        return ClientKind::Api;
    }
    if header(headers, CONTENT_TYPE).is_some_and(is_json) {
        return ClientKind::Api;
    }

    match header(headers, ACCEPT) {
        Some(accept) if accept.contains("text/html") => ClientKind::Browser,
        Some(accept) if is_json(accept) => ClientKind::Api,
        _ => ClientKind::Browser,
    }
}

fn is_json(media: &str) -> bool {
    let media = media.to_ascii_lowercase();
    media.contains("application/json") || media.contains("+json")
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is matched case-insensitively; empty tokens are ignored.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = header(headers, AUTHORIZATION)?;
    let (scheme, token) = value.split_at_checked(BEARER_PREFIX.len())?;
    if !scheme.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
