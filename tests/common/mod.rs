#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;
use watchdesk::config::{Config, EmailMode};
use watchdesk::db::User;
use watchdesk::router::{AppState, app_router};
use watchdesk::service::email::{Mailer, OutgoingEmail};
use watchdesk::types::UserStatus;

pub const PASSWORD: &str = "correct-horse-42";
pub const STRIPE_WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const SQUARE_SIGNATURE_KEY: &str = "sq-signature-key";
pub const SQUARE_WEBHOOK_URL: &str = "https://watchdesk.test/api/webhooks/square";

pub fn test_config() -> Config {
    let mut cfg = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "integration-test-secret".to_string(),
        bcrypt_cost: 4,
        admin_email: Some("owner@watchdesk.test".to_string()),
        ..Config::default()
    };
    cfg.email.mode = EmailMode::Memory;
    cfg.stripe.webhook_secret = Some(STRIPE_WEBHOOK_SECRET.to_string());
    cfg.square.webhook_signature_key = Some(SQUARE_SIGNATURE_KEY.to_string());
    cfg.square.webhook_url = Some(SQUARE_WEBHOOK_URL.to_string());
    cfg
}

#[derive(Clone)]
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(cfg: Config) -> TestApp {
    let storage = watchdesk::db::connect(&cfg.database_url)
        .await
        .expect("failed to open test database");
    let state = AppState::new(storage, cfg, Mailer::memory()).expect("failed to build state");
    TestApp {
        app: app_router(state.clone()),
        state,
    }
}

impl TestApp {
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self
            .app
            .clone()
            .oneshot(req)
            .await
            .expect("request failed");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response body was not JSON")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub fn outbox(&self) -> Vec<OutgoingEmail> {
        self.state.mailer.outbox()
    }

    /// Last mailed one-time token sent to `to`.
    pub fn last_token_for(&self, to: &str) -> String {
        let mail = self
            .outbox()
            .into_iter()
            .rev()
            .find(|m| m.to == to)
            .unwrap_or_else(|| panic!("no mail sent to {to}"));
        token_from(&mail.text)
    }

    pub async fn register(&self, username: &str) -> User {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                serde_json::json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": PASSWORD,
                    "first_name": "Test",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let id = body["user"]["id"].as_i64().expect("user id");
        self.state
            .storage
            .get_user(id)
            .await
            .expect("query failed")
            .expect("user exists")
    }

    pub async fn login(&self, login: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                serde_json::json!({"login": login, "password": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().expect("token").to_string()
    }

    /// Registered, verified and logged in.
    pub async fn active_user(&self, username: &str) -> (User, String) {
        let user = self.register(username).await;
        self.state
            .storage
            .set_user_status(user.id, UserStatus::Active)
            .await
            .expect("activate");
        let token = self.login(username).await;
        (user, token)
    }

    pub async fn admin_user(&self, username: &str) -> (User, String) {
        let (user, _) = self.active_user(username).await;
        self.state
            .storage
            .set_user_admin(user.id, true)
            .await
            .expect("promote");
        // Re-login so the token carries the admin claim.
        let token = self.login(username).await;
        (user, token)
    }
}

pub fn token_from(text: &str) -> String {
    let start = text.find("token=").expect("mail has no token link") + "token=".len();
    text[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}
