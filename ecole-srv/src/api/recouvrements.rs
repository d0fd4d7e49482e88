//! Recouvrement endpoints
//!
//! - `POST /recouvrements/ensure/` `{affectation}`: get-or-create, 201/200
//! - `POST /recouvrements/` `{affectation}`: plain create
//! - `GET /recouvrements/?affectation=`
//! - `GET /recouvrements/:id/`, `PATCH /recouvrements/:id/`

use super::{check_references, ensure_disabled};
use crate::db::identity::Registry;
use crate::db::{recouvrements, Upsert};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use ecole_common::keys::coerce_key;
use ecole_common::models::{invalid_pk, Recouvrement, RecouvrementPatch, ValidationError, REQUIRED};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct RecouvrementBody {
    #[serde(default)]
    pub affectation: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecouvrementQuery {
    pub affectation: Option<i64>,
}

async fn validated_affectation(
    state: &AppState,
    payload: Result<Json<RecouvrementBody>, JsonRejection>,
) -> ApiResult<i64> {
    let Json(body) = payload?;
    let id = match body.affectation {
        None | Some(Value::Null) => {
            return Err(ValidationError::single("affectation", REQUIRED).into());
        }
        Some(ref v) => match coerce_key(v) {
            Some(id) if id > 0 => id,
            Some(id) => return Err(ValidationError::single("affectation", invalid_pk(id)).into()),
            None => {
                return Err(
                    ValidationError::single("affectation", "A valid integer is required.").into(),
                )
            }
        },
    };
    check_references(&state.db, &[("affectation", Registry::Affectations, id)]).await?;
    Ok(id)
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Recouvrement {} not found", id))
}

pub async fn list_recouvrements(
    State(state): State<AppState>,
    Query(query): Query<RecouvrementQuery>,
) -> ApiResult<Json<Vec<Recouvrement>>> {
    Ok(Json(recouvrements::list(&state.db, query.affectation).await?))
}

pub async fn get_recouvrement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Recouvrement>> {
    recouvrements::get(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

pub async fn create_recouvrement(
    State(state): State<AppState>,
    payload: Result<Json<RecouvrementBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Recouvrement>)> {
    let affectation = validated_affectation(&state, payload).await?;
    let rec = recouvrements::create(&state.db, affectation).await?;
    Ok((StatusCode::CREATED, Json(rec)))
}

pub async fn ensure_recouvrement(
    State(state): State<AppState>,
    payload: Result<Json<RecouvrementBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Recouvrement>)> {
    let affectation = validated_affectation(&state, payload).await?;
    match recouvrements::ensure(&state.db, affectation).await? {
        Upsert::Created(rec) => Ok((StatusCode::CREATED, Json(rec))),
        Upsert::Existing(rec) => Ok((StatusCode::OK, Json(rec))),
        Upsert::Conflict => Err(ApiError::Collision(
            "A recouvrement already exists for this affectation.".to_string(),
        )),
    }
}

pub async fn patch_recouvrement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Recouvrement>> {
    let Json(body) = payload?;
    let patch = RecouvrementPatch::from_json(&body)?;
    recouvrements::patch(&state.db, id, &patch)
        .await?
        .map(Json)
        .ok_or_else(|| not_found(id))
}

/// Build recouvrement routes; `ensure_enabled = false` turns the ensure route into a 404
pub fn recouvrement_routes(ensure_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route(
            "/recouvrements/",
            get(list_recouvrements).post(create_recouvrement),
        )
        .route(
            "/recouvrements/:id/",
            get(get_recouvrement).patch(patch_recouvrement),
        );

    if ensure_enabled {
        router.route("/recouvrements/ensure/", post(ensure_recouvrement))
    } else {
        router.route("/recouvrements/ensure/", post(ensure_disabled))
    }
}
