use mimalloc::MiMalloc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use watchdesk::config::Config;
use watchdesk::router::{AppState, app_router};
use watchdesk::service::email::Mailer;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cfg = Config::load()?;

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.loglevel.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    info!(
        database_url = %cfg.database_url,
        listen_addr = %cfg.listen_addr,
        loglevel = %cfg.loglevel,
        email_mode = ?cfg.email.mode,
        app_url = %cfg.app_url
    );

    let storage = watchdesk::db::connect(&cfg.database_url).await?;
    let mailer = Mailer::from_config(&cfg.email)?;
    let addr = cfg.listen_addr.clone();
    let state = AppState::new(storage, cfg, mailer)?;

    // Idle throttle keys would otherwise accumulate forever.
    let throttle = state.throttle.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(300));
        loop {
            tick.tick().await;
            throttle.prune();
        }
    });

    let app = app_router(state);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
