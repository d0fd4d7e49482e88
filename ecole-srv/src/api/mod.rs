//! HTTP API handlers for ecole-srv

pub mod affectations;
pub mod auth;
pub mod health;
pub mod identity;
pub mod recouvrements;
pub mod stats;

pub use affectations::affectation_routes;
pub use auth::auth_routes;
pub use health::health_routes;
pub use identity::identity_routes;
pub use recouvrements::recouvrement_routes;
pub use stats::stats_routes;

use crate::db::identity::{self as registry_db, Registry};
use crate::{ApiError, ApiResult};
use axum::http::StatusCode;
use ecole_common::models::{invalid_pk, FieldErrors};
use sqlx::SqlitePool;

/// Handler registered on `ensure/` routes when the feature is switched off
pub(crate) async fn ensure_disabled() -> ApiResult<StatusCode> {
    Err(ApiError::NotFound("ensure endpoint is disabled".to_string()))
}

/// Report every referenced id that does not exist as a field error
pub(crate) async fn check_references(
    pool: &SqlitePool,
    references: &[(&str, Registry, i64)],
) -> ApiResult<()> {
    let mut errors = FieldErrors::new();
    for &(field, registry, id) in references {
        if !registry_db::exists(pool, registry, id).await? {
            errors.add(field, invalid_pk(id));
        }
    }
    errors.into_result()?;
    Ok(())
}
