//! Request/response types for login and user management

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account status; disabled accounts cannot log in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserStatus {
    #[default]
    On,
    Off,
}

impl UserStatus {
    pub fn code(&self) -> &'static str {
        match self {
            UserStatus::On => "On",
            UserStatus::Off => "Off",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "On" => Some(UserStatus::On),
            "Off" => Some(UserStatus::Off),
            _ => None,
        }
    }
}

/// Body of `POST /login/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Profile of the logged-in operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub fullname: String,
    pub role: String,
    #[serde(default)]
    pub derniereconnection: Option<DateTime<Utc>>,
}

/// Successful `POST /login/` answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user: SessionUser,
    pub message: String,
}

/// Body of `POST /utilisateurs/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUtilisateur {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub nom: Option<String>,
    #[serde(default)]
    pub prenom: Option<String>,
    #[serde(default)]
    pub fonction: Option<String>,
    pub contact: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub statut: UserStatus,
}

impl NewUtilisateur {
    /// `"Prenom Nom"`, falling back to the username
    pub fn fullname(&self) -> String {
        let parts: Vec<&str> = [self.prenom.as_deref(), self.nom.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            self.username.clone()
        } else {
            parts.join(" ")
        }
    }
}
