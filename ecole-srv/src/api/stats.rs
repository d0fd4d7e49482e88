//! Dashboard statistics
//!
//! - `GET /stats/affectations/?annee=`
//! - `GET /stats/recouvrements/?annee=&classe=&niveau=&option=`
//!
//! Filters use display values (`2024-2025`, class label, level/option codes).

use crate::db::stats as rows;
use crate::{ApiResult, AppState};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use ecole_common::stats::{
    affectation_stats, recouvrement_stats, AffectationStats, RecouvrementStats, StatsFilter,
};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub annee: Option<String>,
    pub classe: Option<String>,
    pub niveau: Option<String>,
    pub option: Option<String>,
}

pub async fn get_affectation_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<AffectationStats>> {
    let affectations = rows::affectation_rows(&state.db).await?;
    Ok(Json(affectation_stats(&affectations, query.annee.as_deref())))
}

pub async fn get_recouvrement_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> ApiResult<Json<RecouvrementStats>> {
    let filter = StatsFilter::new(
        query.annee.as_deref(),
        query.classe.as_deref(),
        query.niveau.as_deref(),
        query.option.as_deref(),
    );
    let affectations = rows::affectation_rows(&state.db).await?;
    let recouvrements = rows::recouvrement_rows(&state.db).await?;
    Ok(Json(recouvrement_stats(&affectations, &recouvrements, &filter)))
}

/// Build statistics routes
pub fn stats_routes() -> Router<AppState> {
    Router::new()
        .route("/stats/affectations/", get(get_affectation_stats))
        .route("/stats/recouvrements/", get(get_recouvrement_stats))
}
