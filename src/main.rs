use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use handwood::api::{create_app, AppState};
use handwood::config::Config;
use handwood::error::{AppError, Result};
use handwood::middleware::{auth::AuthState, session::SessionStore};
use handwood::services::{mailer::SmtpMailer, rate_limit::OrderRateLimiter};
use handwood::store::Store;

const LIMITER_SHRINK_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    if let Err(err) = run().await {
        error!(error = %err, "Server stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Arc::new(Config::from_env()?);

    let store = Arc::new(Store::connect(&config.database_url, config.public_dir.clone()).await?);
    store.init(&config.admin).await?;

    let mailer = SmtpMailer::from_config(&config.smtp)?;
    let rate_limit = NonZeroU32::new(config.order.rate_limit_per_hour)
        .ok_or_else(|| AppError::Config("ORDER_RATE_LIMIT must be positive".to_owned()))?;
    let order_limiter = Arc::new(OrderRateLimiter::per_hour(rate_limit));

    let sessions = Arc::new(SessionStore::new(config.session.ttl));
    let auth = AuthState::new(sessions, &config.session.secret, config.session.secure_cookies);

    let state = AppState {
        store: store.clone(),
        auth,
        mailer: Arc::new(mailer),
        order_limiter: order_limiter.clone(),
        config: config.clone(),
    };

    let shrinker = tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_SHRINK_INTERVAL);
        loop {
            interval.tick().await;
            order_limiter.shrink();
        }
    });

    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(config.server_address()).await?;
    info!(address = %listener.local_addr()?, "HandWood server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shrinker.abort();
    store.close().await?;
    info!("Database connection closed");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for the shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
