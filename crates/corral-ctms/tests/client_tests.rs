//! Integration tests for the CTMS gateway: token caching, single 401
//! re-auth, status mapping, and identity resolution cardinality.

use corral_core::{EmailId, KeyValueCache, MemoryCache, SyncError};
use corral_ctms::resolver::{resolve, ContactIdentifier};
use corral_ctms::{CtmsClient, CtmsConfig};
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> CtmsConfig {
    serde_json::from_value(json!({
        "api_url": server.uri(),
        "client_id": "corral-id",
        "client_secret": "corral-secret"
    }))
    .unwrap()
}

fn client_for(server: &MockServer, cache: Arc<MemoryCache>) -> CtmsClient {
    CtmsClient::new(config_for(server), cache).unwrap()
}

fn mount_token_endpoint(server: &MockServer, token: &str) -> Mock {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(basic_auth("corral-id", "corral-secret"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": token,
            "token_type": "bearer",
            "expires_in": 3600
        })))
}

fn sample_contact(email_id: &str) -> serde_json::Value {
    json!({
        "email": {
            "email_id": email_id,
            "primary_email": "contact@example.com",
            "basket_token": "a-token"
        }
    })
}

#[tokio::test]
async fn test_token_fetched_once_and_cached() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-1")
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ctms/abc"))
        .and(wiremock::matchers::header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_contact("abc")))
        .expect(2)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    let client = client_for(&server, cache.clone());
    let id = EmailId::new("abc");
    client.get_by_email_id(&id).await.unwrap();
    client.get_by_email_id(&id).await.unwrap();

    // the token landed in the shared cache for other workers
    let cached = cache.get("ctms_token").await.unwrap();
    assert_eq!(cached["access_token"], "tok-1");
}

#[tokio::test]
async fn test_401_triggers_one_reauth_and_replay() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-2").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms/abc"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ctms/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_contact("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(MemoryCache::new());
    // poison the cache with an expired token so the first request 401s
    cache
        .set(
            "ctms_token",
            json!({"access_token": "stale"}),
            std::time::Duration::from_secs(60),
        )
        .await;

    let client = client_for(&server, cache);
    let contact = client.get_by_email_id(&EmailId::new("abc")).await.unwrap();
    assert_eq!(contact["email"]["primary_email"], "contact@example.com");
}

#[tokio::test]
async fn test_second_401_is_fatal() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-3").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms/abc"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let err = client.get_by_email_id(&EmailId::new("abc")).await.unwrap_err();
    assert!(matches!(err, SyncError::Auth { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_failed_token_fetch_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"detail": "Incorrect username or password"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let err = client.get_by_email_id(&EmailId::new("abc")).await.unwrap_err();
    assert!(matches!(err, SyncError::Auth { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_status_mapping() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-4").mount(&server).await;
    for (route, status) in [("/ctms/missing", 404), ("/ctms/dup", 409), ("/ctms/err", 503)] {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let client = client_for(&server, Arc::new(MemoryCache::new()));

    let err = client.get_by_email_id(&EmailId::new("missing")).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound { .. }), "got {err:?}");

    let err = client.get_by_email_id(&EmailId::new("dup")).await.unwrap_err();
    assert!(matches!(err, SyncError::Duplicate { .. }), "got {err:?}");

    let err = client.get_by_email_id(&EmailId::new("err")).await.unwrap_err();
    assert!(err.is_transient(), "5xx should be transient, got {err:?}");
}

#[tokio::test]
async fn test_create_posts_contact() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-5").mount(&server).await;
    Mock::given(method("POST"))
        .and(path("/ctms"))
        .and(body_string_contains("new@example.com"))
        .respond_with(ResponseTemplate::new(201).set_body_json(sample_contact("fresh-id")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let created = client
        .create(&json!({"email": {"primary_email": "new@example.com"}}))
        .await
        .unwrap();
    assert_eq!(created["email"]["email_id"], "fresh-id");
}

#[tokio::test]
async fn test_replace_puts_by_email_id() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-6").mount(&server).await;
    Mock::given(method("PUT"))
        .and(path("/ctms/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_contact("abc")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    client
        .replace_by_email_id(&EmailId::new("abc"), &sample_contact("abc"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-7").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms/limited"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let err = client.get_by_email_id(&EmailId::new("limited")).await.unwrap_err();
    match err {
        SyncError::RateLimited { retry_after_secs } => {
            assert_eq!(retry_after_secs, Some(30));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

// ── Identity resolution ───────────────────────────────────────────────

#[tokio::test]
async fn test_resolve_no_identifiers_is_invalid_argument() {
    let server = MockServer::start().await;
    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let err = resolve(&client, &[]).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidArgument { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_resolve_email_id_bypasses_search() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-8").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms/direct-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_contact("direct-id")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let ids = [
        ContactIdentifier::Token("some-token".into()),
        ContactIdentifier::EmailId(EmailId::new("direct-id")),
        ContactIdentifier::Email("some@example.com".into()),
    ];
    let contact = resolve(&client, &ids).await.unwrap().unwrap();
    assert_eq!(contact["email"]["email_id"], "direct-id");
}

#[tokio::test]
async fn test_resolve_zero_matches_is_none() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-9").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms"))
        .and(query_param("basket_token", "unknown"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let result = resolve(&client, &[ContactIdentifier::Token("unknown".into())])
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_resolve_single_match() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-10").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms"))
        .and(query_param("primary_email", "contact@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_contact("abc")])))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let contact = resolve(
        &client,
        &[ContactIdentifier::Email("contact@example.com".into())],
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(contact["email"]["basket_token"], "a-token");
}

#[tokio::test]
async fn test_resolve_multiple_matches_is_ambiguous() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-11").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms"))
        .and(query_param("amo_user_id", "98765"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([sample_contact("one"), sample_contact("two")])),
        )
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let err = resolve(&client, &[ContactIdentifier::AmoUserId("98765".into())])
        .await
        .unwrap_err();
    match err {
        SyncError::AmbiguousIdentity { identifier } => {
            assert_eq!(identifier, "amo_user_id=98765");
        }
        other => panic!("expected AmbiguousIdentity, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_surfaces_unhandled_4xx() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "tok-12").mount(&server).await;
    Mock::given(method("GET"))
        .and(path("/ctms/bad"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unprocessable"))
        .mount(&server)
        .await;

    let client = client_for(&server, Arc::new(MemoryCache::new()));
    let err = client
        .request(Method::GET, "/ctms/bad", &[], None)
        .await
        .unwrap_err();
    match err {
        SyncError::Http { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "unprocessable");
        }
        other => panic!("expected Http, got {other:?}"),
    }
}
