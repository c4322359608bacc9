pub mod admin;
pub mod extract;
pub mod public;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    Extension, Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::config::Config;
use crate::middleware::{auth::AuthState, logging::logging_middleware};
use crate::services::{mailer::Mailer, rate_limit::OrderRateLimiter};
use crate::store::Store;

use admin::admin_router;
use public::public_router;

/// Everything a handler may need, shared behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub auth: AuthState,
    pub mailer: Arc<dyn Mailer>,
    pub order_limiter: Arc<OrderRateLimiter>,
    pub config: Arc<Config>,
}

pub fn create_app(state: AppState) -> Router {
    let max_body_size = state.config.server.max_body_size;
    let cors = cors_layer(&state.config.cors_allowed);

    Router::new()
        .merge(public_router())
        .merge(admin_router(state.auth.clone()))
        .layer(Extension(state))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(logging_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}
