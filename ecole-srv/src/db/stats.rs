//! Row loaders for the dashboard aggregations in `ecole_common::stats`

use ecole_common::models::{EtatAffectation, INSTALLMENT_COUNT};
use ecole_common::stats::{AffectationRow, Dimensions, RecouvrementRow};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn dimensions_from_row(row: &SqliteRow) -> Dimensions {
    Dimensions {
        annee_nom: row.get("annee_nom"),
        classe_nom: row.get("classe_nom"),
        niveau_classe: row.get("niveau_classe"),
        option_classe: row.get("option_classe"),
    }
}

pub async fn affectation_rows(pool: &SqlitePool) -> sqlx::Result<Vec<AffectationRow>> {
    let rows = sqlx::query(
        r#"
        SELECT a.etat_aff, y.annee_scolaire AS annee_nom, c.lib_classe AS classe_nom,
               c.niveau_classe, c.option_classe
        FROM affectations a
        LEFT JOIN annees y ON y.id = a.annee_aff
        LEFT JOIN classes c ON c.id = a.classe_aff
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let etat: String = row.get("etat_aff");
            AffectationRow {
                dims: dimensions_from_row(row),
                etat: EtatAffectation::from_code(&etat).unwrap_or(EtatAffectation::Autre),
            }
        })
        .collect())
}

pub async fn recouvrement_rows(pool: &SqlitePool) -> sqlx::Result<Vec<RecouvrementRow>> {
    let paid = (1..=INSTALLMENT_COUNT)
        .map(|n| format!("r.v{}", n))
        .collect::<Vec<_>>()
        .join(" + ");
    let rows = sqlx::query(&format!(
        r#"
        SELECT r.affectation, COALESCE(r.frais_paiement, 0) AS frais_total, ({}) AS montant_paye,
               y.annee_scolaire AS annee_nom, c.lib_classe AS classe_nom,
               c.niveau_classe, c.option_classe
        FROM recouvrements r
        LEFT JOIN affectations a ON a.id = r.affectation
        LEFT JOIN annees y ON y.id = a.annee_aff
        LEFT JOIN classes c ON c.id = a.classe_aff
        "#,
        paid
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| RecouvrementRow {
            affectation_id: row.get("affectation"),
            dims: dimensions_from_row(row),
            frais_total: row.get("frais_total"),
            montant_paye: row.get("montant_paye"),
        })
        .collect())
}
