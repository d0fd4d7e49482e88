//! ecole-srv library - school registry REST service
//!
//! Serves years, classes, students, fee schedules, affectations and
//! recouvrements over SQLite, plus login and dashboard statistics.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// When false the `ensure/` routes answer 404
    pub ensure_endpoints: bool,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, ensure_endpoints: bool) -> Self {
        Self {
            db,
            ensure_endpoints,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::auth_routes())
        .merge(api::identity_routes())
        .merge(api::affectation_routes(state.ensure_endpoints))
        .merge(api::recouvrement_routes(state.ensure_endpoints))
        .merge(api::stats_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
