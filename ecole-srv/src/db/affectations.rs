//! Affectation persistence
//!
//! Uniqueness is enforced by the schema: one row per (student, class, year)
//! and one class per student per year. Plain inserts surface violations as
//! errors; [`ensure`] turns them into an idempotent get-or-create.

use super::Upsert;
use chrono::{DateTime, Utc};
use ecole_common::models::{Affectation, EtatAffectation, ReconciliationRequest};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info};

const SELECT_AFFECTATION: &str = r#"
    SELECT a.id, a.eleve_aff, a.classe_aff, a.annee_aff, a.etat_aff, a.date_aff,
           e.fullname AS eleve_fullname, e.matricule AS eleve_matricule,
           c.lib_classe AS classe_nom, c.niveau_classe, c.option_classe,
           y.annee_scolaire AS annee_nom
    FROM affectations a
    JOIN eleves e ON e.id = a.eleve_aff
    LEFT JOIN classes c ON c.id = a.classe_aff
    LEFT JOIN annees y ON y.id = a.annee_aff
"#;

fn affectation_from_row(row: &SqliteRow) -> Affectation {
    let etat: String = row.get("etat_aff");
    let date_aff: Option<DateTime<Utc>> = row.try_get("date_aff").ok();
    Affectation {
        id: row.get("id"),
        eleve_aff: row.get("eleve_aff"),
        classe_aff: row.get("classe_aff"),
        annee_aff: row.get("annee_aff"),
        etat_aff: EtatAffectation::from_code(&etat).unwrap_or(EtatAffectation::Autre),
        date_aff,
        eleve_fullname: row.get("eleve_fullname"),
        eleve_matricule: row.get("eleve_matricule"),
        classe_nom: row.get("classe_nom"),
        annee_nom: row.get("annee_nom"),
        niveau_classe: row.get("niveau_classe"),
        option_classe: row.get("option_classe"),
    }
}

/// Optional list filters; `None` means "any"
#[derive(Debug, Clone, Copy, Default)]
pub struct AffectationFilter {
    pub eleve: Option<i64>,
    pub classe: Option<i64>,
    pub annee: Option<i64>,
}

/// Newest year first, then by student first name
pub async fn list(pool: &SqlitePool, filter: AffectationFilter) -> sqlx::Result<Vec<Affectation>> {
    let rows = sqlx::query(&format!(
        r#"{}
        WHERE (?1 IS NULL OR a.eleve_aff = ?1)
          AND (?2 IS NULL OR a.classe_aff = ?2)
          AND (?3 IS NULL OR a.annee_aff = ?3)
        ORDER BY a.annee_aff DESC, e.prenom1, a.id"#,
        SELECT_AFFECTATION
    ))
    .bind(filter.eleve)
    .bind(filter.classe)
    .bind(filter.annee)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(affectation_from_row).collect())
}

pub async fn get(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Affectation>> {
    let mut conn = pool.acquire().await?;
    fetch(&mut conn, id).await
}

async fn fetch(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Affectation>> {
    let row = sqlx::query(&format!("{} WHERE a.id = ?", SELECT_AFFECTATION))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(affectation_from_row))
}

async fn fetch_required(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Affectation> {
    fetch(conn, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Plain insert; a duplicate triplet or year fails with a unique violation
pub async fn create(pool: &SqlitePool, req: &ReconciliationRequest) -> sqlx::Result<Affectation> {
    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        "INSERT INTO affectations (eleve_aff, classe_aff, annee_aff, etat_aff, date_aff) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(req.key.eleve)
    .bind(req.key.classe)
    .bind(req.key.annee)
    .bind(req.etat.code())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let affectation = fetch_required(&mut tx, id).await?;
    tx.commit().await?;

    info!(id, key = %req.key, "Created affectation");
    Ok(affectation)
}

/// Get-or-create by triplet inside one transaction.
///
/// `INSERT ... ON CONFLICT DO NOTHING` never fails on a duplicate; the
/// follow-up select tells apart "inserted", "already there" and "blocked by
/// another constraint".
pub async fn ensure(
    pool: &SqlitePool,
    req: &ReconciliationRequest,
) -> sqlx::Result<Upsert<Affectation>> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        r#"
        INSERT INTO affectations (eleve_aff, classe_aff, annee_aff, etat_aff, date_aff)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(req.key.eleve)
    .bind(req.key.classe)
    .bind(req.key.annee)
    .bind(req.etat.code())
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    let id: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM affectations WHERE eleve_aff = ? AND classe_aff = ? AND annee_aff = ?",
    )
    .bind(req.key.eleve)
    .bind(req.key.classe)
    .bind(req.key.annee)
    .fetch_optional(&mut *tx)
    .await?;

    let outcome = match id {
        Some(id) => {
            let affectation = fetch_required(&mut tx, id).await?;
            if inserted {
                info!(id, key = %req.key, "Created affectation");
                Upsert::Created(affectation)
            } else {
                debug!(id, key = %req.key, "Affectation already exists");
                Upsert::Existing(affectation)
            }
        }
        None => Upsert::Conflict,
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Replace key fields and status (`PUT`)
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    req: &ReconciliationRequest,
) -> sqlx::Result<Option<Affectation>> {
    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        "UPDATE affectations SET eleve_aff = ?, classe_aff = ?, annee_aff = ?, etat_aff = ? WHERE id = ?",
    )
    .bind(req.key.eleve)
    .bind(req.key.classe)
    .bind(req.key.annee)
    .bind(req.etat.code())
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if updated == 0 {
        return Ok(None);
    }

    // Class or year may have changed, so the linked fees follow
    super::recouvrements::refresh_fees_for_affectation(&mut tx, id).await?;

    let affectation = fetch_required(&mut tx, id).await?;
    tx.commit().await?;
    info!(id, key = %req.key, "Updated affectation");
    Ok(Some(affectation))
}
