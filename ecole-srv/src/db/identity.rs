//! Identity registry persistence: years, classes, students, fee schedules

use chrono::Utc;
use ecole_common::matricule::{self, MatriculeParts};
use ecole_common::models::{
    Annee, Classe, Eleve, FraisScolarite, NewClasse, NewEleve, NewFrais, Niveau, OptionClasse,
    Sexe,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::info;

/// Tables that can be referenced by id from a request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registry {
    Annees,
    Classes,
    Eleves,
    Affectations,
}

impl Registry {
    fn table(&self) -> &'static str {
        match self {
            Registry::Annees => "annees",
            Registry::Classes => "classes",
            Registry::Eleves => "eleves",
            Registry::Affectations => "affectations",
        }
    }
}

/// True when a row with this id exists
pub async fn exists(pool: &SqlitePool, registry: Registry, id: i64) -> sqlx::Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = ?", registry.table());
    let count: i64 = sqlx::query_scalar(&sql).bind(id).fetch_one(pool).await?;
    Ok(count > 0)
}

// ========================================
// Years
// ========================================

fn annee_from_row(row: &SqliteRow) -> Annee {
    Annee {
        id: row.get("id"),
        annee_scolaire: row.get("annee_scolaire"),
        debut: row.get("debut"),
        fin: row.get("fin"),
    }
}

pub async fn create_annee(
    pool: &SqlitePool,
    label: &str,
    debut: i64,
    fin: i64,
) -> sqlx::Result<Annee> {
    let id = sqlx::query("INSERT INTO annees (annee_scolaire, debut, fin) VALUES (?, ?, ?)")
        .bind(label)
        .bind(debut)
        .bind(fin)
        .execute(pool)
        .await?
        .last_insert_rowid();

    info!(id, annee = label, "Created school year");
    Ok(Annee {
        id,
        annee_scolaire: label.to_string(),
        debut,
        fin,
    })
}

/// Newest year first
pub async fn list_annees(pool: &SqlitePool) -> sqlx::Result<Vec<Annee>> {
    let rows = sqlx::query("SELECT id, annee_scolaire, debut, fin FROM annees ORDER BY debut DESC")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(annee_from_row).collect())
}

pub async fn get_annee(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Annee>> {
    let row = sqlx::query("SELECT id, annee_scolaire, debut, fin FROM annees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(annee_from_row))
}

// ========================================
// Classes
// ========================================

fn classe_from_row(row: &SqliteRow) -> Classe {
    let niveau: String = row.get("niveau_classe");
    let option: String = row.get("option_classe");
    Classe {
        id: row.get("id"),
        code_classe: row.get("code_classe"),
        lib_classe: row.get("lib_classe"),
        niveau_classe: Niveau::from_code(&niveau).unwrap_or_default(),
        option_classe: OptionClasse::from_code(&option).unwrap_or_default(),
    }
}

const SELECT_CLASSE: &str =
    "SELECT id, code_classe, lib_classe, niveau_classe, option_classe FROM classes";

pub async fn create_classe(pool: &SqlitePool, new: &NewClasse) -> sqlx::Result<Classe> {
    let id = sqlx::query(
        "INSERT INTO classes (code_classe, lib_classe, niveau_classe, option_classe) VALUES (?, ?, ?, ?)",
    )
    .bind(new.code_classe.trim())
    .bind(new.lib_classe.trim())
    .bind(new.niveau_classe.code())
    .bind(new.option_classe.code())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(id, code = %new.code_classe, "Created class");
    Ok(Classe {
        id,
        code_classe: new.code_classe.trim().to_string(),
        lib_classe: new.lib_classe.trim().to_string(),
        niveau_classe: new.niveau_classe,
        option_classe: new.option_classe,
    })
}

pub async fn list_classes(pool: &SqlitePool) -> sqlx::Result<Vec<Classe>> {
    let rows = sqlx::query(&format!("{} ORDER BY code_classe", SELECT_CLASSE))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(classe_from_row).collect())
}

pub async fn get_classe(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Classe>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_CLASSE))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(classe_from_row))
}

// ========================================
// Students
// ========================================

const SELECT_ELEVE: &str = r#"
    SELECT id, matricule, nom, prenom1, prenom2, prenom3, fullname, sexe,
           jour_naissance, mois_naissance, annee_naissance, date_naissance,
           lieu_naissance, pere, mere, dateajout
    FROM eleves
"#;

fn eleve_from_row(row: &SqliteRow) -> Eleve {
    let sexe: String = row.get("sexe");
    Eleve {
        id: row.get("id"),
        matricule: row.get("matricule"),
        nom: row.get("nom"),
        prenom1: row.get("prenom1"),
        prenom2: row.get("prenom2"),
        prenom3: row.get("prenom3"),
        fullname: row.get("fullname"),
        sexe: Sexe::from_code(&sexe).unwrap_or_default(),
        jour_naissance: row.get("jour_naissance"),
        mois_naissance: row.get("mois_naissance"),
        annee_naissance: row.get("annee_naissance"),
        date_naissance: row.get("date_naissance"),
        lieu_naissance: row.get("lieu_naissance"),
        pere: row.get("pere"),
        mere: row.get("mere"),
        dateajout: row.get("dateajout"),
    }
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Insert a student, then stamp the matricule once the id is known
pub async fn create_eleve(pool: &SqlitePool, new: &NewEleve) -> sqlx::Result<Eleve> {
    let today = Utc::now().date_naive();
    let mut tx = pool.begin().await?;

    let id = sqlx::query(
        r#"
        INSERT INTO eleves (
            nom, prenom1, prenom2, prenom3, fullname, sexe,
            jour_naissance, mois_naissance, annee_naissance, date_naissance,
            lieu_naissance, pere, mere, dateajout
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.nom.trim())
    .bind(new.prenom1.trim())
    .bind(blank_to_none(&new.prenom2))
    .bind(blank_to_none(&new.prenom3))
    .bind(new.fullname())
    .bind(new.sexe.code())
    .bind(new.jour_naissance)
    .bind(new.mois_naissance)
    .bind(new.annee_naissance)
    .bind(new.date_naissance())
    .bind(blank_to_none(&new.lieu_naissance))
    .bind(blank_to_none(&new.pere))
    .bind(blank_to_none(&new.mere))
    .bind(today)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let prenoms = new.prenoms();
    let matricule = matricule::generate(&MatriculeParts {
        nom: &new.nom,
        prenoms: &prenoms,
        jour: new.jour_naissance,
        mois: new.mois_naissance,
        annee: new.annee_naissance,
        sexe: new.sexe.code(),
        id,
        annee_ajout: super::current_year(),
    });

    sqlx::query("UPDATE eleves SET matricule = ? WHERE id = ?")
        .bind(&matricule)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let eleve = fetch_eleve(&mut *tx, id).await?;
    tx.commit().await?;

    info!(id, matricule = %matricule, "Registered student");
    Ok(eleve)
}

async fn fetch_eleve(conn: &mut SqliteConnection, id: i64) -> sqlx::Result<Eleve> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_ELEVE))
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(eleve_from_row(&row))
}

/// Students ordered by first name, optionally filtered on name or matricule
pub async fn list_eleves(pool: &SqlitePool, search: Option<&str>) -> sqlx::Result<Vec<Eleve>> {
    let search = search.map(str::trim).filter(|s| !s.is_empty());
    let rows = match search {
        Some(term) => {
            let pattern = format!("%{}%", term);
            sqlx::query(&format!(
                "{} WHERE fullname LIKE ? OR matricule LIKE ? ORDER BY prenom1, id",
                SELECT_ELEVE
            ))
            .bind(&pattern)
            .bind(&pattern)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!("{} ORDER BY prenom1, id", SELECT_ELEVE))
                .fetch_all(pool)
                .await?
        }
    };
    Ok(rows.iter().map(eleve_from_row).collect())
}

pub async fn get_eleve(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Eleve>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_ELEVE))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(eleve_from_row))
}

// ========================================
// Fee schedules
// ========================================

const SELECT_FRAIS: &str =
    "SELECT id, annee_fs, classe_fs, frais_annuel, t1_fs, t2_fs, t3_fs FROM frais_scolarite";

fn frais_from_row(row: &SqliteRow) -> FraisScolarite {
    FraisScolarite {
        id: row.get("id"),
        annee_fs: row.get("annee_fs"),
        classe_fs: row.get("classe_fs"),
        frais_annuel: row.get("frais_annuel"),
        t1_fs: row.get("t1_fs"),
        t2_fs: row.get("t2_fs"),
        t3_fs: row.get("t3_fs"),
    }
}

pub async fn create_frais(pool: &SqlitePool, new: &NewFrais) -> sqlx::Result<FraisScolarite> {
    let id = sqlx::query(
        "INSERT INTO frais_scolarite (annee_fs, classe_fs, frais_annuel, t1_fs, t2_fs, t3_fs) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(new.annee_fs)
    .bind(new.classe_fs)
    .bind(new.frais_annuel)
    .bind(new.t1_fs)
    .bind(new.t2_fs)
    .bind(new.t3_fs)
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(id, classe = new.classe_fs, annee = ?new.annee_fs, "Created fee schedule");
    Ok(FraisScolarite {
        id,
        annee_fs: new.annee_fs,
        classe_fs: new.classe_fs,
        frais_annuel: new.frais_annuel,
        t1_fs: new.t1_fs,
        t2_fs: new.t2_fs,
        t3_fs: new.t3_fs,
    })
}

pub async fn list_frais(
    pool: &SqlitePool,
    annee: Option<i64>,
    classe: Option<i64>,
) -> sqlx::Result<Vec<FraisScolarite>> {
    let rows = sqlx::query(&format!(
        "{} WHERE (?1 IS NULL OR annee_fs = ?1) AND (?2 IS NULL OR classe_fs = ?2) ORDER BY id",
        SELECT_FRAIS
    ))
    .bind(annee)
    .bind(classe)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(frais_from_row).collect())
}

pub async fn get_frais(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<FraisScolarite>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_FRAIS))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(frais_from_row))
}

/// First fee schedule for a (year, class) pair
pub async fn find_frais(
    conn: &mut SqliteConnection,
    annee: i64,
    classe: i64,
) -> sqlx::Result<Option<FraisScolarite>> {
    let row = sqlx::query(&format!(
        "{} WHERE annee_fs = ? AND classe_fs = ? ORDER BY id LIMIT 1",
        SELECT_FRAIS
    ))
    .bind(annee)
    .bind(classe)
    .fetch_optional(conn)
    .await?;
    Ok(row.as_ref().map(frais_from_row))
}
