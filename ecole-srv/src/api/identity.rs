//! Registry endpoints: years, classes, students, fee schedules
//!
//! - `POST/GET /annees/`, `GET /annees/:id/`
//! - `POST/GET /classes/`, `GET /classes/:id/`
//! - `POST/GET /eleves/?search=`, `GET /eleves/:id/`
//! - `POST/GET /frais/?annee_fs=&classe_fs=`, `GET /frais/:id/`

use super::check_references;
use crate::db::{self, identity::Registry};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use ecole_common::models::{
    Annee, Classe, Eleve, FraisScolarite, NewAnnee, NewClasse, NewEleve, NewFrais,
};
use serde::Deserialize;
use tracing::info;

fn not_found(kind: &str, id: i64) -> ApiError {
    ApiError::NotFound(format!("{} {} not found", kind, id))
}

// ========================================
// Years
// ========================================

pub async fn create_annee(
    State(state): State<AppState>,
    payload: Result<Json<NewAnnee>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Annee>)> {
    let Json(new) = payload?;
    let label = new.validate()?;
    let annee = db::identity::create_annee(&state.db, &label, new.debut, new.fin).await?;
    Ok((StatusCode::CREATED, Json(annee)))
}

pub async fn list_annees(State(state): State<AppState>) -> ApiResult<Json<Vec<Annee>>> {
    Ok(Json(db::identity::list_annees(&state.db).await?))
}

pub async fn get_annee(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Annee>> {
    db::identity::get_annee(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Year", id))
}

// ========================================
// Classes
// ========================================

pub async fn create_classe(
    State(state): State<AppState>,
    payload: Result<Json<NewClasse>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Classe>)> {
    let Json(new) = payload?;
    new.validate()?;
    let classe = db::identity::create_classe(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(classe)))
}

pub async fn list_classes(State(state): State<AppState>) -> ApiResult<Json<Vec<Classe>>> {
    Ok(Json(db::identity::list_classes(&state.db).await?))
}

pub async fn get_classe(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Classe>> {
    db::identity::get_classe(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Class", id))
}

// ========================================
// Students
// ========================================

#[derive(Debug, Deserialize)]
pub struct EleveQuery {
    pub search: Option<String>,
}

pub async fn create_eleve(
    State(state): State<AppState>,
    payload: Result<Json<NewEleve>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Eleve>)> {
    let Json(new) = payload?;
    new.validate(db::current_year())?;
    let eleve = db::identity::create_eleve(&state.db, &new).await?;
    Ok((StatusCode::CREATED, Json(eleve)))
}

pub async fn list_eleves(
    State(state): State<AppState>,
    Query(query): Query<EleveQuery>,
) -> ApiResult<Json<Vec<Eleve>>> {
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    Ok(Json(db::identity::list_eleves(&state.db, search).await?))
}

pub async fn get_eleve(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Eleve>> {
    db::identity::get_eleve(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Student", id))
}

// ========================================
// Fee schedules
// ========================================

#[derive(Debug, Deserialize)]
pub struct FraisQuery {
    pub annee_fs: Option<i64>,
    pub classe_fs: Option<i64>,
}

pub async fn create_frais(
    State(state): State<AppState>,
    payload: Result<Json<NewFrais>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<FraisScolarite>)> {
    let Json(new) = payload?;
    new.validate()?;

    let mut references = vec![("classe_fs", Registry::Classes, new.classe_fs)];
    if let Some(annee) = new.annee_fs {
        references.push(("annee_fs", Registry::Annees, annee));
    }
    check_references(&state.db, &references).await?;

    let frais = db::identity::create_frais(&state.db, &new).await?;
    info!(
        id = frais.id,
        classe = frais.classe_fs,
        frais_annuel = frais.frais_annuel,
        "Created fee schedule"
    );
    Ok((StatusCode::CREATED, Json(frais)))
}

pub async fn list_frais(
    State(state): State<AppState>,
    Query(query): Query<FraisQuery>,
) -> ApiResult<Json<Vec<FraisScolarite>>> {
    Ok(Json(
        db::identity::list_frais(&state.db, query.annee_fs, query.classe_fs).await?,
    ))
}

pub async fn get_frais(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<FraisScolarite>> {
    db::identity::get_frais(&state.db, id)
        .await?
        .map(Json)
        .ok_or_else(|| not_found("Fee schedule", id))
}

/// Build registry routes
pub fn identity_routes() -> Router<AppState> {
    Router::new()
        .route("/annees/", get(list_annees).post(create_annee))
        .route("/annees/:id/", get(get_annee))
        .route("/classes/", get(list_classes).post(create_classe))
        .route("/classes/:id/", get(get_classe))
        .route("/eleves/", get(list_eleves).post(create_eleve))
        .route("/eleves/:id/", get(get_eleve))
        .route("/frais/", get(list_frais).post(create_frais))
        .route("/frais/:id/", get(get_frais))
}
