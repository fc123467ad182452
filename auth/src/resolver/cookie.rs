//! Session cookie parsing and `Set-Cookie` values.
//!
//! Session cookies are always `HttpOnly; SameSite=Lax; Path=/`, plus
//! `Secure` unless disabled for local plain-http development.

use crate::config::ResolverConfig;
use chrono::Duration;
use http::HeaderMap;
use http::header::COOKIE;

/// Find a cookie value across all `Cookie` headers.
#[must_use]
pub fn find_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
}

fn attributes(config: &ResolverConfig) -> &'static str {
    if config.secure_cookies {
        "Path=/; HttpOnly; Secure; SameSite=Lax"
    } else {
        "Path=/; HttpOnly; SameSite=Lax"
    }
}

/// `Set-Cookie` value establishing a session.
#[must_use]
pub fn session_cookie(config: &ResolverConfig, session_id: &str, max_age: Duration) -> String {
    format!(
        "{}={session_id}; {}; Max-Age={}",
        config.session_cookie_name,
        attributes(config),
        max_age.num_seconds().max(0)
    )
}

/// `Set-Cookie` value deleting the session cookie.
#[must_use]
pub fn clear_session_cookie(config: &ResolverConfig) -> String {
    format!(
        "{}=; {}; Max-Age=0",
        config.session_cookie_name,
        attributes(config)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_find_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; lang=en"));
        headers.append(COOKIE, HeaderValue::from_static("session=abc123"));

        assert_eq!(find_cookie(&headers, "session"), Some("abc123"));
        assert_eq!(find_cookie(&headers, "lang"), Some("en"));
        assert_eq!(find_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_empty_cookie_is_absent() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session="));
        assert_eq!(find_cookie(&headers, "session"), None);
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie(&ResolverConfig::default(), "abc", Duration::days(7));
        assert_eq!(
            cookie,
            "session=abc; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=604800"
        );
    }

    #[test]
    fn test_clear_cookie() {
        let config = ResolverConfig::default().with_secure_cookies(false);
        assert_eq!(
            clear_session_cookie(&config),
            "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
        );
    }
}
