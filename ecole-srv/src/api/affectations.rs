//! Affectation endpoints
//!
//! - `POST /affectations/ensure/`: get-or-create by (student, class, year),
//!   201 when created and 200 when it already existed
//! - `POST /affectations/`: plain create, 400 `non_field_errors` on duplicates
//! - `GET /affectations/?eleve_aff=&classe_aff=&annee_aff=`
//! - `GET /affectations/:id/`, `PUT /affectations/:id/`

use super::{check_references, ensure_disabled};
use crate::db::affectations::{self, AffectationFilter};
use crate::db::identity::Registry;
use crate::db::Upsert;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ecole_common::models::{Affectation, AffectationPayload, ReconciliationRequest};
use serde::Deserialize;
use tracing::warn;

/// Message returned when the one-class-per-year rule blocks an ensure
const YEAR_TAKEN: &str = "The student already has an affectation for this year.";

#[derive(Debug, Default, Deserialize)]
pub struct AffectationQuery {
    pub eleve_aff: Option<i64>,
    pub classe_aff: Option<i64>,
    pub annee_aff: Option<i64>,
}

/// Validate the body and check that the three referenced rows exist
async fn validated_request(
    state: &AppState,
    payload: Result<Json<AffectationPayload>, JsonRejection>,
) -> ApiResult<ReconciliationRequest> {
    let Json(payload) = payload?;
    let req = payload.validate()?;
    check_references(
        &state.db,
        &[
            ("eleve_aff", Registry::Eleves, req.key.eleve),
            ("classe_aff", Registry::Classes, req.key.classe),
            ("annee_aff", Registry::Annees, req.key.annee),
        ],
    )
    .await?;
    Ok(req)
}

pub async fn list_affectations(
    State(state): State<AppState>,
    Query(query): Query<AffectationQuery>,
) -> ApiResult<Json<Vec<Affectation>>> {
    let filter = AffectationFilter {
        eleve: query.eleve_aff,
        classe: query.classe_aff,
        annee: query.annee_aff,
    };
    Ok(Json(affectations::list(&state.db, filter).await?))
}

pub async fn get_affectation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Affectation>> {
    affectations::get(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Affectation {} not found", id)))
}

pub async fn create_affectation(
    State(state): State<AppState>,
    payload: Result<Json<AffectationPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Affectation>)> {
    let req = validated_request(&state, payload).await?;
    let affectation = affectations::create(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(affectation)))
}

pub async fn ensure_affectation(
    State(state): State<AppState>,
    payload: Result<Json<AffectationPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Affectation>)> {
    let req = validated_request(&state, payload).await?;
    match affectations::ensure(&state.db, &req).await? {
        Upsert::Created(a) => Ok((StatusCode::CREATED, Json(a))),
        Upsert::Existing(a) => Ok((StatusCode::OK, Json(a))),
        Upsert::Conflict => {
            warn!(key = %req.key, "Ensure blocked by an affectation in another class");
            Err(ApiError::Collision(YEAR_TAKEN.to_string()))
        }
    }
}

pub async fn update_affectation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<AffectationPayload>, JsonRejection>,
) -> ApiResult<Json<Affectation>> {
    let req = validated_request(&state, payload).await?;
    affectations::update(&state.db, id, &req)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Affectation {} not found", id)))
}

/// Build affectation routes; `ensure_enabled = false` turns the ensure route into a 404
pub fn affectation_routes(ensure_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route(
            "/affectations/",
            get(list_affectations).post(create_affectation),
        )
        .route(
            "/affectations/:id/",
            get(get_affectation).put(update_affectation),
        );

    if ensure_enabled {
        router.route("/affectations/ensure/", post(ensure_affectation))
    } else {
        router.route("/affectations/ensure/", post(ensure_disabled))
    }
}
