//! Recouvrement persistence
//!
//! At most one recouvrement per affectation (UNIQUE column). Every write
//! re-derives the fee amounts from the fee schedule of the affectation's
//! year and class.

use super::identity::find_frais;
use super::Upsert;
use chrono::NaiveDate;
use ecole_common::ledger::DerivedFees;
use ecole_common::models::{
    Installment, Recouvrement, RecouvrementPatch, StatutAr, Tuteur, INSTALLMENT_COUNT,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

const SELECT_RECOUVREMENT: &str = r#"
    SELECT r.*,
           e.fullname AS info_eleve, e.matricule AS info_matricule,
           c.lib_classe AS info_classe
    FROM recouvrements r
    LEFT JOIN affectations a ON a.id = r.affectation
    LEFT JOIN eleves e ON e.id = a.eleve_aff
    LEFT JOIN classes c ON c.id = a.classe_aff
"#;

fn recouvrement_from_row(row: &SqliteRow) -> Recouvrement {
    let statut: String = row.get("statut_ar");
    let mut installments = [Installment::default(); INSTALLMENT_COUNT];
    for (i, slot) in installments.iter_mut().enumerate() {
        let n = i + 1;
        slot.amount = row.get(format!("v{}", n).as_str());
        let date: Option<String> = row.get(format!("d{}", n).as_str());
        slot.date = date.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok());
    }

    Recouvrement {
        id: row.get("id"),
        affectation: row.get("affectation"),
        statut_ar: StatutAr::from_code(&statut).unwrap_or_default(),
        montant_statut_ar: row.get("montant_statut_ar"),
        reduction: row.get("reduction"),
        frais_paiement: row.get("frais_paiement"),
        tranches: [
            row.get("tranche1_paiement"),
            row.get("tranche2_paiement"),
            row.get("tranche3_paiement"),
        ],
        tuteur: Tuteur {
            nom: row.get("tuteur_paiement"),
            contact: row.get("contact_tuteur_paiement"),
            adresse: row.get("adresse_tuteur_paiement"),
            profession: row.get("profession_tuteur_paiement"),
        },
        installments,
        info_eleve: row.get("info_eleve"),
        info_matricule: row.get("info_matricule"),
        info_classe: row.get("info_classe"),
    }
}

pub async fn list(pool: &SqlitePool, affectation: Option<i64>) -> sqlx::Result<Vec<Recouvrement>> {
    let rows = sqlx::query(&format!(
        "{} WHERE (?1 IS NULL OR r.affectation = ?1) ORDER BY r.id",
        SELECT_RECOUVREMENT
    ))
    .bind(affectation)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(recouvrement_from_row).collect())
}

pub async fn get(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Recouvrement>> {
    let mut conn = pool.acquire().await?;
    fetch(&mut conn, id).await
}

async fn fetch(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Option<Recouvrement>> {
    let row = sqlx::query(&format!("{} WHERE r.id = ?", SELECT_RECOUVREMENT))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(row.as_ref().map(recouvrement_from_row))
}

async fn fetch_required(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Recouvrement> {
    fetch(conn, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Plain insert; a second recouvrement for the same affectation fails with a
/// unique violation
pub async fn create(pool: &SqlitePool, affectation: i64) -> sqlx::Result<Recouvrement> {
    let mut tx = pool.begin().await?;
    let id = sqlx::query("INSERT INTO recouvrements (affectation) VALUES (?)")
        .bind(affectation)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    apply_derived_fees(&mut tx, id).await?;
    let rec = fetch_required(&mut tx, id).await?;
    tx.commit().await?;

    info!(id, affectation, "Created recouvrement");
    Ok(rec)
}

/// Get-or-create by affectation id inside one transaction
pub async fn ensure(pool: &SqlitePool, affectation: i64) -> sqlx::Result<Upsert<Recouvrement>> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO recouvrements (affectation) VALUES (?) ON CONFLICT (affectation) DO NOTHING",
    )
    .bind(affectation)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        == 1;

    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM recouvrements WHERE affectation = ?")
        .bind(affectation)
        .fetch_optional(&mut *tx)
        .await?;

    let outcome = match id {
        Some(id) if inserted => {
            apply_derived_fees(&mut tx, id).await?;
            info!(id, affectation, "Created recouvrement");
            Upsert::Created(fetch_required(&mut tx, id).await?)
        }
        Some(id) => {
            debug!(id, affectation, "Recouvrement already exists");
            Upsert::Existing(fetch_required(&mut tx, id).await?)
        }
        None => Upsert::Conflict,
    };

    tx.commit().await?;
    Ok(outcome)
}

/// Apply a partial update, then re-derive the fees. `None` when the id is unknown.
pub async fn patch(
    pool: &SqlitePool,
    id: i64,
    patch: &RecouvrementPatch,
) -> sqlx::Result<Option<Recouvrement>> {
    let mut tx = pool.begin().await?;
    let Some(mut rec) = fetch(&mut tx, id).await? else {
        return Ok(None);
    };
    patch.apply(&mut rec);

    let installment_columns: String = (1..=INSTALLMENT_COUNT)
        .map(|n| format!(", v{n} = ?, d{n} = ?", n = n))
        .collect();
    let sql = format!(
        r#"UPDATE recouvrements SET
            statut_ar = ?, montant_statut_ar = ?, reduction = ?,
            tuteur_paiement = ?, contact_tuteur_paiement = ?,
            adresse_tuteur_paiement = ?, profession_tuteur_paiement = ?{}
            , updated_at = CURRENT_TIMESTAMP
           WHERE id = ?"#,
        installment_columns
    );

    let mut query = sqlx::query(&sql)
        .bind(rec.statut_ar.code())
        .bind(rec.montant_statut_ar)
        .bind(rec.reduction)
        .bind(rec.tuteur.nom.clone())
        .bind(rec.tuteur.contact.clone())
        .bind(rec.tuteur.adresse.clone())
        .bind(rec.tuteur.profession.clone());
    for slot in &rec.installments {
        query = query
            .bind(slot.amount)
            .bind(slot.date.map(|d| d.format("%Y-%m-%d").to_string()));
    }
    query.bind(id).execute(&mut *tx).await?;

    apply_derived_fees(&mut tx, id).await?;
    let updated = fetch_required(&mut tx, id).await?;
    tx.commit().await?;

    info!(id, total_paye = updated.total_paye(), "Updated recouvrement");
    Ok(Some(updated))
}

/// Recompute `frais_paiement` and the three tranches from the fee schedule.
///
/// Keeps the stored values when the affectation lacks a year or class, or
/// when no schedule exists for the pair.
pub(crate) async fn apply_derived_fees(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<()> {
    let row = sqlx::query(
        r#"
        SELECT r.reduction, a.annee_aff, a.classe_aff
        FROM recouvrements r
        LEFT JOIN affectations a ON a.id = r.affectation
        WHERE r.id = ?
        "#,
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    let reduction: i64 = row.get("reduction");
    let annee: Option<i64> = row.get("annee_aff");
    let classe: Option<i64> = row.get("classe_aff");

    let (Some(annee), Some(classe)) = (annee, classe) else {
        warn!(id, "Affectation incomplete, fees left unchanged");
        return Ok(());
    };
    let Some(schedule) = find_frais(&mut *conn, annee, classe).await? else {
        warn!(id, annee, classe, "No fee schedule for year/class, fees left unchanged");
        return Ok(());
    };

    let fees = DerivedFees::from_schedule(&schedule, reduction);
    sqlx::query(
        r#"
        UPDATE recouvrements
        SET frais_paiement = ?, tranche1_paiement = ?, tranche2_paiement = ?, tranche3_paiement = ?
        WHERE id = ?
        "#,
    )
    .bind(fees.frais_paiement)
    .bind(fees.tranches[0])
    .bind(fees.tranches[1])
    .bind(fees.tranches[2])
    .bind(id)
    .execute(&mut *conn)
    .await?;

    debug!(id, frais_paiement = fees.frais_paiement, "Derived fees");
    Ok(())
}

/// Re-derive the fees of the recouvrement linked to an affectation, if any
pub(crate) async fn refresh_fees_for_affectation(
    conn: &mut SqliteConnection,
    affectation: i64,
) -> sqlx::Result<()> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM recouvrements WHERE affectation = ?")
        .bind(affectation)
        .fetch_optional(&mut *conn)
        .await?;
    match id {
        Some(id) => apply_derived_fees(conn, id).await,
        None => Ok(()),
    }
}
