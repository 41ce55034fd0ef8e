mod common;

use axum::http::{Method, StatusCode};
use common::{PASSWORD, spawn_app, spawn_app_with, test_config};
use serde_json::json;
use watchdesk::types::UserStatus;

#[tokio::test]
async fn health_reports_ok() {
    let app = spawn_app().await;
    let (status, body) = app.request(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn register_verify_login_flow() {
    let app = spawn_app().await;
    let user = app.register("ada").await;
    assert_eq!(user.status, UserStatus::Pending);

    // Unverified accounts cannot log in yet.
    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({"login": "ada", "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Email not verified");

    let token = app.last_token_for("ada@example.com");
    let (status, body) = app
        .post("/api/auth/verify", None, json!({"token": token}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["status"], "active");

    // A second click on the same link is still fine.
    let (status, body) = app
        .post("/api/auth/verify", None, json!({"token": token}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    // Login is case-insensitive and accepts the email too.
    let jwt = app.login("ADA@example.com").await;
    let (status, me) = app.get("/api/auth/me", &jwt).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "ada");
    assert!(me.get("password_hash").is_none());
    assert_eq!(me["has_stripe_secret"], false);
}

#[tokio::test]
async fn bogus_verification_token_is_rejected() {
    let app = spawn_app().await;
    let (status, body) = app
        .post("/api/auth/verify", None, json!({"token": "nope"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Invalid"));
}

#[tokio::test]
async fn duplicate_username_or_email_conflicts() {
    let app = spawn_app().await;
    app.register("grace").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({"username": "GRACE", "email": "other@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username is already taken");

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({"username": "grace2", "email": "Grace@Example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Email is already registered");
}

#[tokio::test]
async fn register_validates_input() {
    let app = spawn_app().await;
    for body in [
        json!({"username": "ab", "email": "a@example.com", "password": PASSWORD}),
        json!({"username": "abc", "email": "not-an-email", "password": PASSWORD}),
        json!({"username": "abc", "email": "a@example.com", "password": "short"}),
    ] {
        let (status, resp) = app.post("/api/auth/register", None, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{resp}");
        assert!(resp["error"].is_string());
    }

    // Malformed JSON uses the same error shape.
    let (status, resp) = app
        .post("/api/auth/register", None, json!({"username": 5}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["error"].is_string());
}

#[tokio::test]
async fn wrong_password_and_missing_token_are_unauthorized() {
    let app = spawn_app().await;
    app.active_user("linus").await;

    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({"login": "linus", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.request(Method::GET, "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/auth/me", "not.a.jwt").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn suspended_users_lose_access_immediately() {
    let app = spawn_app().await;
    let (user, token) = app.active_user("mallory").await;
    app.state
        .storage
        .set_user_status(user.id, UserStatus::Suspended)
        .await
        .unwrap();

    let (status, _) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post(
            "/api/auth/login",
            None,
            json!({"login": "mallory", "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn password_reset_is_single_use_and_activates_pending_users() {
    let app = spawn_app().await;
    app.register("hopper").await;

    // Unknown addresses get the same answer.
    let (status, _) = app
        .post(
            "/api/auth/forgot-password",
            None,
            json!({"email": "nobody@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            "/api/auth/forgot-password",
            None,
            json!({"email": "hopper@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = app.last_token_for("hopper@example.com");

    let body = json!({"token": token, "password": "brand-new-pass"});
    let (status, _) = app
        .post("/api/auth/reset-password", None, body.clone())
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post("/api/auth/reset-password", None, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, resp) = app
        .post(
            "/api/auth/login",
            None,
            json!({"login": "hopper", "password": "brand-new-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{resp}");
    assert_eq!(resp["user"]["status"], "active");
}

#[tokio::test]
async fn login_attempts_are_throttled() {
    let mut cfg = test_config();
    cfg.login_attempts_per_minute = 2;
    let app = spawn_app_with(cfg).await;

    let attempt = json!({"login": "ghost", "password": "whatever-123"});
    for _ in 0..2 {
        let (status, _) = app.post("/api/auth/login", None, attempt.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = app.post("/api/auth/login", None, attempt).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn oversized_bodies_get_413() {
    let mut cfg = test_config();
    cfg.body_limit_bytes = 1024;
    let app = spawn_app_with(cfg).await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({"username": "x".repeat(4096), "email": "a@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn account_settings_roundtrip() {
    let app = spawn_app().await;
    let (_, token) = app.active_user("turing").await;
    app.register("church").await;

    let (status, body) = app
        .put(
            "/api/account",
            &token,
            json!({"first_name": " Alan ", "last_name": "Turing", "email": "church@example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, body) = app
        .put(
            "/api/account",
            &token,
            json!({"first_name": " Alan ", "last_name": "Turing", "email": "Alan@Example.com"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["first_name"], "Alan");
    assert_eq!(body["email"], "alan@example.com");

    let (status, _) = app
        .put(
            "/api/account/stripe-keys",
            &token,
            json!({"publishable_key": "sk_wrong", "secret_key": "sk_test_1"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, body) = app
        .put(
            "/api/account/stripe-keys",
            &token,
            json!({"publishable_key": "pk_test_1", "secret_key": "rk_test_1"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["has_stripe_secret"], true);
    assert!(body.get("stripe_secret_key").is_none());

    let (status, sub) = app.get("/api/account/subscription", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sub["effective_tier"], "free");
    assert_eq!(sub["watch_limit"], 25);
    assert_eq!(sub["active_watches"], 0);

    let (status, _) = app
        .put(
            "/api/account/password",
            &token,
            json!({"current_password": "nope-nope", "new_password": "another-pass"}),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::DELETE,
            "/api/account",
            Some(&token),
            Some(json!({"password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
