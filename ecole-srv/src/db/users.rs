//! Operator accounts

use chrono::{DateTime, Utc};
use ecole_common::api::{NewUtilisateur, SessionUser, UserStatus};
use sqlx::{Row, SqlitePool};
use tracing::info;

/// Stored account with the fields login needs
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub profile: SessionUser,
    pub password_hash: String,
    pub statut: UserStatus,
}

/// Insert a user; `encoded_password` is already hashed
pub async fn create_user(
    pool: &SqlitePool,
    new: &NewUtilisateur,
    encoded_password: &str,
) -> sqlx::Result<SessionUser> {
    let id = sqlx::query(
        r#"
        INSERT INTO utilisateurs (username, nom, prenom, fonction, contact, email, password, role, statut)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.username.trim())
    .bind(&new.nom)
    .bind(&new.prenom)
    .bind(&new.fonction)
    .bind(new.contact.trim())
    .bind(&new.email)
    .bind(encoded_password)
    .bind(&new.role)
    .bind(new.statut.code())
    .execute(pool)
    .await?
    .last_insert_rowid();

    info!(id, username = %new.username.trim(), "Created user");
    Ok(SessionUser {
        id,
        username: new.username.trim().to_string(),
        fullname: new.fullname(),
        role: new.role.clone().unwrap_or_default(),
        derniereconnection: None,
    })
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> sqlx::Result<Option<StoredUser>> {
    let row = sqlx::query(
        r#"
        SELECT id, username, nom, prenom, role, password, statut, derniereconnection
        FROM utilisateurs
        WHERE username = ?
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| {
        let username: String = row.get("username");
        let fullname = [row.get::<Option<String>, _>("prenom"), row.get("nom")]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let statut: String = row.get("statut");
        let derniereconnection: Option<DateTime<Utc>> =
            row.try_get("derniereconnection").ok().flatten();
        StoredUser {
            profile: SessionUser {
                id: row.get("id"),
                fullname: if fullname.is_empty() {
                    username.clone()
                } else {
                    fullname
                },
                username,
                role: row.get::<Option<String>, _>("role").unwrap_or_default(),
                derniereconnection,
            },
            password_hash: row.get("password"),
            statut: UserStatus::from_code(&statut).unwrap_or(UserStatus::Off),
        }
    }))
}

/// Stamp a successful login; returns the recorded time
pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> sqlx::Result<DateTime<Utc>> {
    let now = Utc::now();
    sqlx::query("UPDATE utilisateurs SET derniereconnection = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(now)
}
