// API module - HTTP endpoints

pub mod admin;
pub mod customers;
pub mod dashboard;
pub mod fraud_results;
pub mod health;
pub mod predictions;
pub mod response;
pub mod subscriptions;
pub mod transactions;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use sqlx::PgPool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}

/// Builds the full application router
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .merge(transactions::router())
        .merge(customers::router())
        .merge(subscriptions::router())
        .merge(fraud_results::router())
        .merge(predictions::router())
        .merge(dashboard::router())
        .merge(admin::router())
        .layer(TraceLayer::new_for_http());

    if let Some(origin) = &state.config.cors_allow_origin {
        let origin: HeaderValue = origin.parse()?;
        router = router.layer(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE]),
        );
    }

    Ok(router.with_state(state))
}
