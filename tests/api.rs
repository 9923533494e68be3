use std::sync::OnceLock;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

use todo_api::{
    app::build_app,
    auth::{claims::Claims, dto::TokenResponse, password::hash_password},
    config::{AppConfig, JwtConfig, LogConfig, UserEntry},
    state::AppState,
};

const SECRET: &str = "integration-secret";

fn testuser_hash() -> &'static str {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| hash_password("secret").expect("hash"))
}

async fn test_app() -> Router {
    test_app_with_pool().await.0
}

// The pool holds a single connection, so tests can starve it on purpose.
async fn test_app_with_pool() -> (Router, SqlitePool) {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    todo_api::db::migrate(&db).await.expect("migrate");

    let config = AppConfig {
        database_url: "sqlite::memory:".into(),
        max_connections: 1,
        host: "127.0.0.1".into(),
        port: 0,
        jwt: JwtConfig {
            secret: SECRET.into(),
            ttl_minutes: 30,
        },
        users: vec![UserEntry {
            username: "testuser".into(),
            password_hash: testuser_hash().to_string(),
        }],
        log: LogConfig::default(),
    };
    let app = build_app(AppState::from_parts(db.clone(), config).expect("state"));
    (app, db)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.expect("response");
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| json!(String::from_utf8_lossy(&bytes)))
    };
    (status, body)
}

fn login_request(username: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(format!("username={username}&password={password}")))
        .unwrap()
}

fn authed(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn login(app: &Router) -> String {
    let (status, body) = send(app, login_request("testuser", "secret")).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    let token: TokenResponse = serde_json::from_value(body).expect("token response");
    token.access_token
}

fn forge(secret: &str, sub: &str, exp: OffsetDateTime) -> String {
    let claims = Claims {
        sub: sub.into(),
        iat: (exp - Duration::minutes(30)).unix_timestamp() as usize,
        exp: exp.unix_timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn login_issues_bearer_token() {
    let app = test_app().await;
    let (status, body) = send(&app, login_request("testuser", "secret")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "bearer");

    let token = body["access_token"].as_str().unwrap();
    let (status, _) = send(&app, authed(Method::GET, "/todos/", token, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let app = test_app().await;
    for (user, pass) in [("testuser", "wrong"), ("nobody", "secret")] {
        let (status, body) = send(&app, login_request(user, pass)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Incorrect username or password");
        assert!(body.get("access_token").is_none());
    }
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = test_app().await;

    let req = Request::builder().uri("/todos/").body(Body::empty()).unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");

    let expired = forge(SECRET, "testuser", OffsetDateTime::now_utc() - Duration::minutes(5));
    let (status, _) = send(&app, authed(Method::GET, "/todos/", &expired, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let foreign = forge(
        "some-other-secret",
        "testuser",
        OffsetDateTime::now_utc() + Duration::minutes(5),
    );
    let (status, _) = send(&app, authed(Method::GET, "/todos/", &foreign, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unknown = forge(SECRET, "ghost", OffsetDateTime::now_utc() + Duration::minutes(5));
    let (status, body) = send(&app, authed(Method::GET, "/todos/", &unknown, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Could not validate credentials");
}

#[tokio::test]
async fn create_then_list() {
    let app = test_app().await;
    let token = login(&app).await;

    let payload = json!({"title": "Buy milk", "description": "2%", "completed": false});
    let (status, created) = send(&app, authed(Method::POST, "/todos/", &token, Some(payload))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(created["id"].is_i64());
    assert_eq!(created["title"], "Buy milk");
    assert_eq!(created["description"], "2%");
    assert_eq!(created["completed"], false);

    let (status, list) = send(&app, authed(Method::GET, "/todos/", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([created]));
}

#[tokio::test]
async fn create_applies_defaults() {
    let app = test_app().await;
    let token = login(&app).await;

    let (status, created) = send(
        &app,
        authed(Method::POST, "/todos", &token, Some(json!({"title": "Walk dog"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["description"], Value::Null);
    assert_eq!(created["completed"], false);
}

#[tokio::test]
async fn partial_update_only_changes_sent_fields() {
    let app = test_app().await;
    let token = login(&app).await;

    let payload = json!({"title": "Buy milk", "description": "2%"});
    let (_, created) = send(&app, authed(Method::POST, "/todos/", &token, Some(payload))).await;
    let uri = format!("/todos/{}", created["id"]);

    let (status, updated) = send(
        &app,
        authed(Method::PUT, &uri, &token, Some(json!({"completed": true}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(updated["completed"], true);
    assert_eq!(updated["title"], "Buy milk");
    assert_eq!(updated["description"], "2%");
    assert_eq!(updated["id"], created["id"]);

    let (status, body) = send(
        &app,
        authed(Method::PUT, "/todos/9999", &token, Some(json!({"completed": true}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Task with ID 9999 not found.");
}

#[tokio::test]
async fn delete_removes_and_second_delete_is_not_found() {
    let app = test_app().await;
    let token = login(&app).await;

    let (_, created) = send(
        &app,
        authed(Method::POST, "/todos/", &token, Some(json!({"title": "Temp"}))),
    )
    .await;
    let uri = format!("/todos/{}", created["id"]);

    let (status, body) = send(&app, authed(Method::DELETE, &uri, &token, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, list) = send(&app, authed(Method::GET, "/todos/", &token, None)).await;
    assert_eq!(list, json!([]));

    let (status, _) = send(&app, authed(Method::DELETE, &uri, &token, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn validation_failures_are_422_and_persist_nothing() {
    let app = test_app().await;
    let token = login(&app).await;

    let long = json!({"title": "x".repeat(101)});
    let (status, _) = send(&app, authed(Method::POST, "/todos/", &token, Some(long))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let wrong_type = json!({"title": "ok", "completed": "yes"});
    let (status, _) = send(&app, authed(Method::POST, "/todos/", &token, Some(wrong_type))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        authed(Method::PUT, "/todos/abc", &token, Some(json!({"completed": true}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, list) = send(&app, authed(Method::GET, "/todos/", &token, None)).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn update_rejects_overlong_title_without_changes() {
    let app = test_app().await;
    let token = login(&app).await;

    let (_, created) = send(
        &app,
        authed(Method::POST, "/todos/", &token, Some(json!({"title": "Keep me"}))),
    )
    .await;
    let uri = format!("/todos/{}", created["id"]);

    let (status, _) = send(
        &app,
        authed(Method::PUT, &uri, &token, Some(json!({"title": "y".repeat(101)}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, list) = send(&app, authed(Method::GET, "/todos/", &token, None)).await;
    assert_eq!(list[0]["title"], "Keep me");
}

#[tokio::test]
async fn health_is_public() {
    let app = test_app().await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_form_problems_are_json_422() {
    let app = test_app().await;

    let missing_password = Request::builder()
        .method(Method::POST)
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("username=x"))
        .unwrap();
    let (status, body) = send(&app, missing_password).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string(), "expected JSON detail, got {body}");

    let json_body = Request::builder()
        .method(Method::POST)
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username":"testuser","password":"secret"}"#))
        .unwrap();
    let (status, body) = send(&app, json_body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["detail"].is_string(), "expected JSON detail, got {body}");
}

#[tokio::test]
async fn non_bearer_authorization_is_rejected() {
    let app = test_app().await;

    for value in ["Basic x", "Bearer", "Bearer ", "Token abc"] {
        let req = Request::builder()
            .uri("/todos/")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "header {value:?}");
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}

#[tokio::test]
async fn update_with_null_description_clears_it() {
    let app = test_app().await;
    let token = login(&app).await;

    let payload = json!({"title": "Buy milk", "description": "2%"});
    let (_, created) = send(&app, authed(Method::POST, "/todos/", &token, Some(payload))).await;
    let uri = format!("/todos/{}", created["id"]);

    let (status, updated) = send(
        &app,
        authed(Method::PUT, &uri, &token, Some(json!({"description": null}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(updated["description"], Value::Null);
    assert_eq!(updated["title"], "Buy milk");
    assert_eq!(updated["completed"], false);

    let (_, list) = send(&app, authed(Method::GET, "/todos/", &token, None)).await;
    assert_eq!(list, json!([updated]));
}

#[tokio::test]
async fn update_with_null_title_is_422() {
    let app = test_app().await;
    let token = login(&app).await;

    let (_, created) = send(
        &app,
        authed(Method::POST, "/todos/", &token, Some(json!({"title": "Keep me"}))),
    )
    .await;
    let uri = format!("/todos/{}", created["id"]);

    for payload in [json!({"title": null}), json!({"completed": null})] {
        let (status, body) = send(&app, authed(Method::PUT, &uri, &token, Some(payload))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    let (_, list) = send(&app, authed(Method::GET, "/todos/", &token, None)).await;
    assert_eq!(list, json!([created]));
}

#[tokio::test]
async fn invalid_payloads_are_rejected_while_the_pool_is_busy() {
    let (app, db) = test_app_with_pool().await;
    let token = login(&app).await;

    // Hold the only connection; a handler that waited on the pool would stall here.
    let held = db.acquire().await.expect("connection");

    let long = json!({"title": "x".repeat(101)});
    let (status, _) = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        send(&app, authed(Method::POST, "/todos/", &token, Some(long))),
    )
    .await
    .expect("validation should not wait on the pool");
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        send(&app, authed(Method::GET, "/todos/", "not-a-token", None)),
    )
    .await
    .expect("auth should not wait on the pool");
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    drop(held);
    let (status, list) = send(&app, authed(Method::GET, "/todos/", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list, json!([]));
}
