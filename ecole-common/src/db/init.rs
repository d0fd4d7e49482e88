//! Database initialization
//!
//! Opens (or creates) the SQLite file and applies the schema. Every statement
//! is `CREATE ... IF NOT EXISTS`, so running it on an existing database is a
//! no-op.

use crate::models::INSTALLMENT_COUNT;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Open the database file, creating it and its parent folder when missing
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// Private in-memory database with the full schema.
///
/// Limited to one connection that is never recycled: every connection to
/// `:memory:` would otherwise see its own empty database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    create_schema(&pool).await?;
    Ok(pool)
}

async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_annees_table(pool).await?;
    create_classes_table(pool).await?;
    create_eleves_table(pool).await?;
    create_frais_table(pool).await?;
    create_affectations_table(pool).await?;
    create_recouvrements_table(pool).await?;
    create_utilisateurs_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_annees_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS annees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            annee_scolaire TEXT NOT NULL,
            debut INTEGER NOT NULL,
            fin INTEGER NOT NULL,
            UNIQUE (debut, fin)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_classes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code_classe TEXT NOT NULL UNIQUE,
            lib_classe TEXT NOT NULL,
            niveau_classe TEXT NOT NULL DEFAULT 'aut',
            option_classe TEXT NOT NULL DEFAULT 'aut'
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_eleves_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS eleves (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            matricule TEXT UNIQUE,
            nom TEXT NOT NULL,
            prenom1 TEXT NOT NULL,
            prenom2 TEXT,
            prenom3 TEXT,
            fullname TEXT NOT NULL,
            sexe TEXT NOT NULL DEFAULT 'O',
            jour_naissance INTEGER NOT NULL DEFAULT 0,
            mois_naissance INTEGER NOT NULL DEFAULT 0,
            annee_naissance INTEGER NOT NULL DEFAULT 0,
            date_naissance TEXT NOT NULL,
            lieu_naissance TEXT,
            pere TEXT,
            mere TEXT,
            dateajout TEXT NOT NULL DEFAULT (date('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_eleves_fullname ON eleves(fullname)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_frais_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS frais_scolarite (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            annee_fs INTEGER REFERENCES annees(id) ON DELETE SET NULL,
            classe_fs INTEGER NOT NULL REFERENCES classes(id) ON DELETE CASCADE,
            frais_annuel INTEGER NOT NULL DEFAULT 0 CHECK (frais_annuel >= 0),
            t1_fs INTEGER NOT NULL DEFAULT 0 CHECK (t1_fs >= 0),
            t2_fs INTEGER NOT NULL DEFAULT 0 CHECK (t2_fs >= 0),
            t3_fs INTEGER NOT NULL DEFAULT 0 CHECK (t3_fs >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_affectations_table(pool: &SqlitePool) -> Result<()> {
    // One class per student per year, and never the same triplet twice
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS affectations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            eleve_aff INTEGER NOT NULL REFERENCES eleves(id) ON DELETE CASCADE,
            classe_aff INTEGER REFERENCES classes(id) ON DELETE SET NULL,
            annee_aff INTEGER REFERENCES annees(id) ON DELETE SET NULL,
            etat_aff TEXT NOT NULL DEFAULT 'Aut',
            date_aff TEXT NOT NULL,
            UNIQUE (eleve_aff, classe_aff, annee_aff),
            UNIQUE (eleve_aff, annee_aff)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_affectations_annee_classe ON affectations(annee_aff, classe_aff)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_recouvrements_table(pool: &SqlitePool) -> Result<()> {
    let installments: String = (1..=INSTALLMENT_COUNT)
        .map(|n| {
            format!(
                "            v{n} INTEGER NOT NULL DEFAULT 0,\n            d{n} TEXT,\n",
                n = n
            )
        })
        .collect();

    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS recouvrements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            affectation INTEGER UNIQUE REFERENCES affectations(id) ON DELETE CASCADE,
            statut_ar TEXT NOT NULL DEFAULT 'Aut',
            montant_statut_ar INTEGER NOT NULL DEFAULT 0 CHECK (montant_statut_ar >= 0),
            reduction INTEGER NOT NULL DEFAULT 0 CHECK (reduction BETWEEN 0 AND 100),
            frais_paiement INTEGER,
            tranche1_paiement INTEGER,
            tranche2_paiement INTEGER,
            tranche3_paiement INTEGER,
            tuteur_paiement TEXT,
            contact_tuteur_paiement TEXT,
            adresse_tuteur_paiement TEXT,
            profession_tuteur_paiement TEXT,
{installments}            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
        installments = installments
    );

    sqlx::query(&sql).execute(pool).await?;
    Ok(())
}

async fn create_utilisateurs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS utilisateurs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            nom TEXT,
            prenom TEXT,
            fonction TEXT,
            contact TEXT NOT NULL UNIQUE,
            email TEXT UNIQUE,
            password TEXT NOT NULL,
            role TEXT,
            statut TEXT NOT NULL DEFAULT 'On' CHECK (statut IN ('On', 'Off')),
            dateajout TEXT NOT NULL DEFAULT (date('now')),
            derniereconnection TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
