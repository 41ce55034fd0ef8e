use crate::api::Payments;
use crate::config::Config;
use crate::db::Storage;
use crate::error::AppError;
use crate::handlers::{
    account, admin, auth, contacts, health, invoices, leads, promo, watches, webhooks,
};
use crate::service::auth::JwtKeys;
use crate::service::email::Mailer;
use crate::service::throttle::Throttle;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub config: Arc<Config>,
    pub mailer: Mailer,
    pub jwt: JwtKeys,
    pub payments: Payments,
    pub throttle: Throttle,
}

impl AppState {
    pub fn new(storage: Storage, config: Config, mailer: Mailer) -> Result<Self, AppError> {
        let payments = Payments::from_config(&config)?;
        Ok(Self {
            storage,
            jwt: JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
            throttle: Throttle::per_minute(config.login_attempts_per_minute),
            mailer,
            payments,
            config: Arc::new(config),
        })
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    if origins.is_empty() {
        return base.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(parsed)
}

pub fn app_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify_email))
        .route("/login", post(auth::login))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/accept-invite", post(auth::accept_invite))
        .route("/me", get(auth::me));

    let account_routes = Router::new()
        .route(
            "/",
            get(account::get_account)
                .put(account::update_account)
                .delete(account::delete_account),
        )
        .route("/password", put(account::change_password))
        .route("/stripe-keys", put(account::set_stripe_keys))
        .route("/square", put(account::set_square_credentials))
        .route("/subscription", get(account::subscription));

    let watch_routes = Router::new()
        .route("/", get(watches::list).post(watches::create))
        .route("/stats", get(watches::stats))
        .route("/import", post(watches::import))
        .route(
            "/{id}",
            get(watches::get_one)
                .put(watches::update)
                .delete(watches::remove),
        );

    let contact_routes = Router::new()
        .route("/", get(contacts::list).post(contacts::create))
        .route("/import", post(contacts::import))
        .route(
            "/{id}",
            get(contacts::get_one)
                .put(contacts::update)
                .delete(contacts::remove),
        )
        .route("/{id}/watches", get(contacts::watches))
        .route(
            "/{id}/cards",
            get(contacts::list_cards).post(contacts::add_card),
        )
        .route("/{id}/cards/{card_id}", delete(contacts::remove_card));

    let lead_routes = Router::new()
        .route("/", get(leads::list).post(leads::create))
        .route("/reminders", get(leads::reminders))
        .route(
            "/{id}",
            get(leads::get_one).put(leads::update).delete(leads::remove),
        )
        .route("/{id}/status", put(leads::set_status));

    let invoice_routes = Router::new()
        .route("/", get(invoices::list).post(invoices::create))
        .route("/{id}", get(invoices::get_one))
        .route("/{id}/void", post(invoices::void));

    let webhook_routes = Router::new()
        .route("/stripe", post(webhooks::stripe))
        .route("/square", post(webhooks::square));

    let admin_routes = Router::new()
        .route("/promo", get(admin::list_promo))
        .route("/promo/{id}/approve", post(admin::approve_promo))
        .route("/promo/{id}/reject", post(admin::reject_promo))
        .route("/users", get(admin::list_users))
        .route("/users/{id}/status", put(admin::set_user_status))
        .route("/users/{id}/subscription", put(admin::set_user_subscription))
        .route("/users/{id}/reset-password", post(admin::send_password_reset));

    let api = Router::new()
        .route("/health", get(health))
        .nest("/auth", auth_routes)
        .nest("/account", account_routes)
        .nest("/watches", watch_routes)
        .nest("/contacts", contact_routes)
        .nest("/leads", lead_routes)
        .nest("/invoices", invoice_routes)
        .nest("/webhooks", webhook_routes)
        .route("/promo/signup", post(promo::signup))
        .nest("/admin", admin_routes);

    let body_limit = state.config.body_limit_bytes;
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
