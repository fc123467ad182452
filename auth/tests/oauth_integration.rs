//! OAuth authorization-code + PKCE integration tests.
//!
//! Covers the full redirect round trip and the one-time code guarantees:
//!
//! - A code is exchanged at most once, even under concurrent redemption
//! - Any failed exchange attempt burns the code
//! - PKCE binding (missing, wrong, or downgrade attempts)
//! - Fail-closed on store outage

use chrono::Duration;
use passgate_auth::mocks::FailingKvStore;
use passgate_auth::oauth::pkce;
use passgate_auth::oauth::{AuthorizationCodeStore, GrantRequest, OAuthClient};
use passgate_auth::stores::MemoryStore;
use passgate_auth::{AuthError, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

const CLIENT: &str = "c1";
const REDIRECT: &str = "https://app/cb";

fn codes() -> AuthorizationCodeStore<MemoryStore> {
    AuthorizationCodeStore::new(MemoryStore::new(), Duration::minutes(10))
}

fn grant(code_challenge: Option<String>) -> GrantRequest {
    GrantRequest {
        client_id: CLIENT.to_string(),
        user_id: UserId::new("u1"),
        redirect_uri: REDIRECT.to_string(),
        scope: "openid email".to_string(),
        code_challenge,
    }
}

#[tokio::test]
async fn test_full_authorization_round_trip() {
    // Arrange: client starts the flow
    let client = OAuthClient::new("https://idp.example.com/authorize", CLIENT, REDIRECT);
    let (url, pending) = client.begin().expect("Failed to build authorization URL");

    let (_, query) = url.split_once('?').unwrap();
    let params: HashMap<String, String> = serde_urlencoded::from_str(query).unwrap();
    assert_eq!(params["code_challenge_method"], "S256");

    // Authorization server issues a code bound to the challenge
    let codes = codes();
    let code = codes
        .create(grant(Some(params["code_challenge"].clone())))
        .await
        .expect("Failed to create code");

    // Act: provider redirects back with the same state
    let verifier = pending
        .complete(&params["state"])
        .expect("State should match");
    let issued = assert_ok!(
        codes
            .validate_and_consume(&code, CLIENT, REDIRECT, Some(&verifier))
            .await
    );

    // Assert
    assert_eq!(issued.user_id, UserId::new("u1"));
    assert_eq!(issued.scope, "openid email");
    assert_eq!(issued.code_challenge_method.as_deref(), Some("S256"));

    let replay = codes
        .validate_and_consume(&code, CLIENT, REDIRECT, Some(&verifier))
        .await;
    assert_eq!(replay, Err(AuthError::CodeNotFound));
}

#[tokio::test]
async fn test_forged_state_is_rejected() {
    let client = OAuthClient::new("https://idp.example.com/authorize", CLIENT, REDIRECT);
    let (_, pending) = client.begin().unwrap();

    assert_eq!(
        pending.complete(&pkce::generate_state()),
        Err(AuthError::StateMismatch)
    );
}

/// Exchange with a wrong redirect URI: rejected, and the code cannot be
/// retried with the right one.
#[tokio::test]
async fn test_wrong_redirect_burns_code() {
    let codes = codes();
    let code = codes.create(grant(None)).await.unwrap();

    let attempt = codes
        .validate_and_consume(&code, CLIENT, "https://evil/cb", None)
        .await;
    assert_eq!(attempt, Err(AuthError::RedirectUriMismatch));

    let retry = codes.validate_and_consume(&code, CLIENT, REDIRECT, None).await;
    assert_eq!(retry, Err(AuthError::CodeNotFound));
}

#[tokio::test]
async fn test_wrong_client_burns_code() {
    let codes = codes();
    let code = codes.create(grant(None)).await.unwrap();

    assert_eq!(
        codes.validate_and_consume(&code, "c2", REDIRECT, None).await,
        Err(AuthError::ClientMismatch)
    );
    assert_eq!(
        codes.validate_and_consume(&code, CLIENT, REDIRECT, None).await,
        Err(AuthError::CodeNotFound)
    );
}

#[tokio::test]
async fn test_pkce_binding() {
    let codes = codes();
    let pair = pkce::generate_pair();

    // Missing verifier
    let code = codes
        .create(grant(Some(pair.code_challenge.clone())))
        .await
        .unwrap();
    assert_eq!(
        codes.validate_and_consume(&code, CLIENT, REDIRECT, None).await,
        Err(AuthError::PkceMismatch)
    );

    // Wrong verifier
    let code = codes
        .create(grant(Some(pair.code_challenge.clone())))
        .await
        .unwrap();
    let other = pkce::generate_pair();
    assert_eq!(
        codes
            .validate_and_consume(&code, CLIENT, REDIRECT, Some(&other.code_verifier))
            .await,
        Err(AuthError::PkceMismatch)
    );

    // Malformed verifier
    let code = codes
        .create(grant(Some(pair.code_challenge.clone())))
        .await
        .unwrap();
    assert_eq!(
        codes
            .validate_and_consume(&code, CLIENT, REDIRECT, Some("short"))
            .await,
        Err(AuthError::InvalidCodeVerifier)
    );

    // Verifier presented for a code issued without PKCE
    let code = codes.create(grant(None)).await.unwrap();
    assert_eq!(
        codes
            .validate_and_consume(&code, CLIENT, REDIRECT, Some(&pair.code_verifier))
            .await,
        Err(AuthError::PkceMismatch)
    );
}

#[tokio::test]
async fn test_malformed_challenge_rejected_at_issue() {
    let err = assert_err!(codes().create(grant(Some("not-a-digest".into()))).await);
    assert!(matches!(err, AuthError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_concurrent_exchange_has_single_winner() {
    let codes = Arc::new(codes());
    let pair = pkce::generate_pair();
    let code = codes
        .create(grant(Some(pair.code_challenge.clone())))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let codes = Arc::clone(&codes);
        let code = code.clone();
        let verifier = pair.code_verifier.clone();
        handles.push(tokio::spawn(async move {
            codes
                .validate_and_consume(&code, CLIENT, REDIRECT, Some(&verifier))
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(e) => assert_eq!(e, AuthError::CodeNotFound),
        }
    }
    assert_eq!(successes, 1, "Exactly one exchange may succeed");
}

#[tokio::test]
async fn test_expired_code_cannot_be_exchanged() {
    let codes = AuthorizationCodeStore::new(MemoryStore::new(), Duration::milliseconds(20));
    let code = codes.create(grant(None)).await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(60)).await;

    let result = codes.validate_and_consume(&code, CLIENT, REDIRECT, None).await;
    assert!(matches!(
        result,
        Err(AuthError::CodeExpired | AuthError::CodeNotFound)
    ));
}

#[tokio::test]
async fn test_store_outage_fails_closed() {
    let codes = AuthorizationCodeStore::new(FailingKvStore::new(), Duration::minutes(10));

    assert!(matches!(
        codes.create(grant(None)).await,
        Err(AuthError::UpstreamUnavailable(_))
    ));
    assert!(matches!(
        codes.validate_and_consume("code", CLIENT, REDIRECT, None).await,
        Err(AuthError::UpstreamUnavailable(_))
    ));
}
