//! Router-level tests driven through `tower::ServiceExt::oneshot`.
//!
//! The envelope and authentication tests run against a lazily connected pool
//! and never reach the database. The flow tests need Postgres and only run
//! when `CAMPUS_TEST_DATABASE_URL` is set.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION,
            CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    Router,
};
use campus_api::{build_router, AppState};
use campus_auth::{Authenticator, JwtManager, LogMailer};
use campus_config::AppConfig;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::ServiceExt;

type TestResult<T = ()> = anyhow::Result<T>;

struct TestContext {
    pool: PgPool,
    router: Router,
    config: AppConfig,
}

impl TestContext {
    /// Router over a pool that never connects unless a handler touches it.
    fn offline() -> TestResult<Self> {
        let config = AppConfig::default();
        let pool = campus_database::lazy_pool(&config.database)?;
        Ok(Self::with_pool(pool, config))
    }

    async fn database() -> TestResult<Option<Self>> {
        let Ok(url) = std::env::var("CAMPUS_TEST_DATABASE_URL") else {
            eprintln!("CAMPUS_TEST_DATABASE_URL not set, skipping");
            return Ok(None);
        };

        let pool = PgPoolOptions::new().max_connections(5).connect(&url).await?;
        campus_database::run_migrations(&pool).await?;
        Ok(Some(Self::with_pool(pool, AppConfig::default())))
    }

    fn with_pool(pool: PgPool, config: AppConfig) -> Self {
        let authenticator = Authenticator::new(pool.clone(), &config.auth, Arc::new(LogMailer));
        let router = build_router(AppState::new(pool.clone(), authenticator));
        Self {
            pool,
            router,
            config,
        }
    }

    async fn send(&self, request: Request<Body>) -> TestResult<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResult<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };
        self.send(request).await
    }

    /// Register and log in a fresh account, returning `(token, user_id)`.
    async fn signup(&self, prefix: &str) -> TestResult<(String, i64)> {
        let username = unique(prefix);
        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({
                    "email": format!("{username}@campus.test"),
                    "username": username,
                    "password": "Password123",
                })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

        let (status, body) = self
            .call(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": username, "password": "Password123" })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");

        let token = body["data"]["token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("login response had no token"))?
            .to_string();
        let id = body["data"]["user"]["id"]
            .as_i64()
            .ok_or_else(|| anyhow::anyhow!("login response had no user id"))?;
        Ok((token, id))
    }
}

fn unique(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &suffix[..10])
}

fn assert_error_envelope(body: &Value, code: &str) {
    assert_eq!(body["success"], false, "expected error envelope: {body}");
    assert_eq!(body["error"]["code"], code, "unexpected error code: {body}");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn health_reports_ok_without_database() -> TestResult {
    let ctx = TestContext::offline()?;

    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = ctx.call(Method::GET, uri, None, None).await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["status"], "ok");
    }
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() -> TestResult {
    let ctx = TestContext::offline()?;

    let (status, body) = ctx.call(Method::GET, "/api/v1/auth/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body, "unauthorized");

    let request = Request::builder()
        .uri("/api/v1/notifications")
        .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::empty())?;
    let (status, body) = ctx.send(request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body, "unauthorized");

    Ok(())
}

#[tokio::test]
async fn forged_tokens_are_rejected() -> TestResult {
    let ctx = TestContext::offline()?;
    let forger = JwtManager::new(
        "not-the-server-secret",
        ctx.config.auth.issuer.clone(),
        ctx.config.auth.audience.clone(),
    );
    let (token, _) = forger.issue(1, "admin")?;

    let (status, body) = ctx
        .call(Method::GET, "/api/v1/admin/stats", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_error_envelope(&body, "invalid_token");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_use_the_error_envelope() -> TestResult {
    let ctx = TestContext::offline()?;

    let (status, body) = ctx.call(Method::GET, "/api/v1/nope", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_error_envelope(&body, "not_found");
    Ok(())
}

#[tokio::test]
async fn malformed_json_is_a_400_envelope() -> TestResult {
    let ctx = TestContext::offline()?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let (status, body) = ctx.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid_body");
    Ok(())
}

#[tokio::test]
async fn mistyped_or_incomplete_json_is_a_400_envelope() -> TestResult {
    let ctx = TestContext::offline()?;

    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "identifier": 5, "password": "Password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid_body");

    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "email": "nobody@campus.test", "password": "Password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid_body");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/auth/login")
        .body(Body::from(r#"{"identifier":"alice","password":"Password123"}"#))?;
    let (status, body) = ctx.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid_body");
    Ok(())
}

#[tokio::test]
async fn malformed_join_body_is_rejected_not_defaulted() -> TestResult {
    let ctx = TestContext::offline()?;

    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/v1/rides/1/join",
            Some("irrelevant"),
            Some(json!({ "seats": "three" })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid_body");
    Ok(())
}

#[tokio::test]
async fn malformed_path_is_a_400_envelope() -> TestResult {
    let ctx = TestContext::offline()?;

    let (status, body) = ctx
        .call(Method::GET, "/api/v1/rides/not-a-number", None, None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid_path");
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served() -> TestResult {
    let ctx = TestContext::offline()?;

    let (status, body) = ctx.call(Method::GET, "/docs/openapi.json", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/v1/rides/{id}/join"].is_object());
    assert!(body["components"]["securitySchemes"]["bearerAuth"].is_object());
    Ok(())
}

#[tokio::test]
async fn cors_preflight_is_answered() -> TestResult {
    let ctx = TestContext::offline()?;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/market/items")
        .header(ORIGIN, "http://localhost:5173")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())?;
    let response = ctx.router.clone().oneshot(request).await?;

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
    Ok(())
}

#[tokio::test]
async fn register_login_and_me() -> TestResult {
    let Some(ctx) = TestContext::database().await? else {
        return Ok(());
    };
    let (token, user_id) = ctx.signup("flow").await?;

    let (status, body) = ctx.call(Method::GET, "/api/v1/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], user_id);
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"].get("password_hash").is_none());

    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({
                "email": body["data"]["email"],
                "username": unique("dupe"),
                "password": "Password123",
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error_envelope(&body, "user_exists");

    Ok(())
}

#[tokio::test]
async fn comments_notify_the_seller() -> TestResult {
    let Some(ctx) = TestContext::database().await? else {
        return Ok(());
    };
    let (seller, _) = ctx.signup("seller").await?;
    let (buyer, _) = ctx.signup("buyer").await?;

    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/v1/market/items",
            Some(&seller),
            Some(json!({
                "title": "Desk lamp",
                "category": "furniture",
                "price_cents": 1500,
                "image_urls": ["https://img.campus.test/lamp.jpg"],
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let item_id = body["data"]["id"].as_i64().unwrap_or_default();

    let uri = format!("/api/v1/market/items/{item_id}");
    let (_, body) = ctx.call(Method::GET, &uri, None, None).await?;
    assert_eq!(body["data"]["view_count"], 1);

    let (status, body) = ctx
        .call(Method::PUT, &uri, Some(&buyer), Some(json!({ "status": "sold" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error_envelope(&body, "forbidden");

    let (status, body) = ctx
        .call(
            Method::POST,
            &format!("{uri}/comments"),
            Some(&buyer),
            Some(json!({ "content": "Is this still available?" })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, body) = ctx
        .call(Method::GET, "/api/v1/notifications/unread-count", Some(&seller), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unread_count"], 1);

    let (_, body) = ctx
        .call(Method::GET, "/api/v1/notifications?unread_only=true", Some(&seller), None)
        .await?;
    assert_eq!(body["data"][0]["kind"], "item_comment");
    assert_eq!(body["pagination"]["total"], 1);

    let (status, _) = ctx
        .call(Method::POST, "/api/v1/notifications/read-all", Some(&seller), None)
        .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = ctx
        .call(Method::GET, "/api/v1/notifications/unread-count", Some(&seller), None)
        .await?;
    assert_eq!(body["data"]["unread_count"], 0);

    Ok(())
}

#[tokio::test]
async fn ride_seats_are_accounted_for() -> TestResult {
    let Some(ctx) = TestContext::database().await? else {
        return Ok(());
    };
    let (driver, _) = ctx.signup("driver").await?;
    let (alice, _) = ctx.signup("alice").await?;
    let (bob, _) = ctx.signup("bob").await?;
    let (carol, _) = ctx.signup("carol").await?;

    let departure = Utc::now() + Duration::days(1);
    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/v1/rides",
            Some(&driver),
            Some(json!({
                "origin": "North Gate",
                "destination": "Central Station",
                "departure_time": departure,
                "seats_total": 2,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["seats_available"], 2);
    let ride_id = body["data"]["id"].as_i64().unwrap_or_default();
    let join = format!("/api/v1/rides/{ride_id}/join");
    let leave = format!("/api/v1/rides/{ride_id}/leave");

    let (status, body) = ctx.call(Method::POST, &join, Some(&driver), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "validation_error");

    let (status, body) = ctx
        .call(Method::POST, &join, Some(&alice), Some(json!({ "seats": "one" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "invalid_body");

    let (status, body) = ctx.call(Method::POST, &join, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["seats_available"], 1);
    assert_eq!(body["data"]["status"], "open");

    let (status, _) = ctx.call(Method::POST, &join, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = ctx
        .call(Method::POST, &join, Some(&bob), Some(json!({ "seats": 1 })))
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["seats_available"], 0);
    assert_eq!(body["data"]["status"], "full");

    let (status, body) = ctx.call(Method::POST, &join, Some(&carol), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_error_envelope(&body, "conflict");

    let (status, body) = ctx.call(Method::POST, &leave, Some(&alice), None).await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["seats_available"], 1);
    assert_eq!(body["data"]["status"], "open");

    let (status, _) = ctx.call(Method::POST, &leave, Some(&carol), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = ctx
        .call(Method::GET, &format!("/api/v1/rides/{ride_id}/passengers"), None, None)
        .await?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let booked: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(seats), 0)::bigint FROM ride_passengers WHERE ride_id = $1",
    )
    .bind(ride_id)
    .fetch_one(&ctx.pool)
    .await?;
    assert_eq!(booked, 1);

    let (_, body) = ctx
        .call(Method::GET, "/api/v1/notifications", Some(&driver), None)
        .await?;
    assert_eq!(body["pagination"]["total"], 3);

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_joins_never_overbook() -> TestResult {
    let Some(ctx) = TestContext::database().await? else {
        return Ok(());
    };
    let (driver, _) = ctx.signup("driver").await?;
    let mut riders = Vec::new();
    for _ in 0..5 {
        riders.push(ctx.signup("rider").await?.0);
    }

    let (status, body) = ctx
        .call(
            Method::POST,
            "/api/v1/rides",
            Some(&driver),
            Some(json!({
                "origin": "Library",
                "destination": "Airport",
                "departure_time": Utc::now() + Duration::days(2),
                "seats_total": 3,
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let ride_id = body["data"]["id"].as_i64().unwrap_or_default();

    let mut handles = Vec::new();
    for token in &riders {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/v1/rides/{ride_id}/join"))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())?;
        let router = ctx.router.clone();
        handles.push(tokio::spawn(async move { router.oneshot(request).await }));
    }

    let mut joined = 0;
    let mut rejected = 0;
    for handle in handles {
        let response = handle.await??;
        match response.status() {
            StatusCode::OK => joined += 1,
            StatusCode::CONFLICT => rejected += 1,
            other => anyhow::bail!("unexpected join status {other}"),
        }
    }
    assert_eq!(joined, 3);
    assert_eq!(rejected, 2);

    let (_, body) = ctx
        .call(Method::GET, &format!("/api/v1/rides/{ride_id}"), None, None)
        .await?;
    assert_eq!(body["data"]["seats_available"], 0);
    assert_eq!(body["data"]["status"], "full");

    let booked: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(seats), 0)::bigint FROM ride_passengers WHERE ride_id = $1",
    )
    .bind(ride_id)
    .fetch_one(&ctx.pool)
    .await?;
    assert_eq!(booked, 3);

    Ok(())
}

#[tokio::test]
async fn conversations_are_unique_per_pair() -> TestResult {
    let Some(ctx) = TestContext::database().await? else {
        return Ok(());
    };
    let (alice, _) = ctx.signup("alice").await?;
    let (bob, bob_id) = ctx.signup("bob").await?;

    let (status, body) = ctx
        .call(Method::POST, "/api/v1/conversations", Some(&alice), Some(json!({ "peer_id": bob_id })))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let conversation_id = body["data"]["id"].as_i64().unwrap_or_default();

    let (status, body) = ctx
        .call(Method::POST, "/api/v1/conversations", Some(&alice), Some(json!({ "peer_id": bob_id })))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], conversation_id);

    let messages = format!("/api/v1/conversations/{conversation_id}/messages");
    let (status, _) = ctx
        .call(Method::POST, &messages, Some(&alice), Some(json!({ "content": "hi bob" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = ctx.call(Method::GET, "/api/v1/conversations", Some(&bob), None).await?;
    let summary = &body["data"][0];
    assert_eq!(summary["id"], conversation_id);
    assert_eq!(summary["last_message"], "hi bob");
    assert_eq!(summary["unread_count"], 1);

    let (_, body) = ctx
        .call(
            Method::POST,
            &format!("/api/v1/conversations/{conversation_id}/read"),
            Some(&bob),
            None,
        )
        .await?;
    assert_eq!(body["data"]["updated"], 1);

    let (carol, _) = ctx.signup("carol").await?;
    let (status, _) = ctx.call(Method::GET, &messages, Some(&carol), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn groups_enforce_membership_rules() -> TestResult {
    let Some(ctx) = TestContext::database().await? else {
        return Ok(());
    };
    let (owner, _) = ctx.signup("owner").await?;
    let (member, _) = ctx.signup("member").await?;
    let (outsider, _) = ctx.signup("outsider").await?;
    let name = unique("Chess club");

    let (status, body) = ctx
        .call(Method::POST, "/api/v1/groups", Some(&owner), Some(json!({ "name": name })))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["viewer_role"], "owner");
    assert_eq!(body["data"]["member_count"], 1);
    let group = format!("/api/v1/groups/{}", body["data"]["id"]);

    let (status, _) = ctx
        .call(Method::POST, "/api/v1/groups", Some(&member), Some(json!({ "name": name })))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = ctx
        .call(Method::POST, &format!("{group}/join"), Some(&member), None)
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["member_count"], 2);

    let (status, _) = ctx
        .call(Method::POST, &format!("{group}/join"), Some(&member), None)
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .call(Method::POST, &format!("{group}/leave"), Some(&owner), None)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let messages = format!("{group}/messages");
    let (status, _) = ctx
        .call(Method::POST, &messages, Some(&member), Some(json!({ "content": "gg" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = ctx
        .call(Method::POST, &messages, Some(&outsider), Some(json!({ "content": "hi" })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = ctx.call(Method::GET, &messages, Some(&outsider), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = ctx.call(Method::GET, &messages, Some(&owner), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["content"], "gg");

    Ok(())
}

#[tokio::test]
async fn admin_routes_check_roles() -> TestResult {
    let Some(ctx) = TestContext::database().await? else {
        return Ok(());
    };
    let (token, user_id) = ctx.signup("staff").await?;

    let (status, body) = ctx
        .call(Method::GET, "/api/v1/admin/stats", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_error_envelope(&body, "forbidden");

    sqlx::query("UPDATE users SET role = 'moderator' WHERE id = $1")
        .bind(user_id)
        .execute(&ctx.pool)
        .await?;

    let (status, body) = ctx
        .call(Method::GET, "/api/v1/admin/stats", Some(&token), None)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["users_total"].as_i64().unwrap_or_default() >= 1);

    let patch = format!("/api/v1/admin/users/{user_id}");
    let (status, _) = ctx
        .call(Method::PATCH, &patch, Some(&token), Some(json!({ "is_active": false })))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(user_id)
        .execute(&ctx.pool)
        .await?;

    let (status, body) = ctx
        .call(Method::PATCH, &patch, Some(&token), Some(json!({ "is_active": false })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_error_envelope(&body, "validation_error");

    let (status, body) = ctx
        .call(Method::PATCH, &patch, Some(&token), Some(json!({ "role": "wizard" })))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    Ok(())
}
