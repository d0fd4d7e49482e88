//! Login and user management
//!
//! - `POST /login/` `{username, password}` → `{user, message}`; 401 on bad
//!   credentials, 403 when the account is disabled
//! - `POST /utilisateurs/` creates an operator account

use crate::db::users;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use ecole_common::api::{
    encode_password, verify_password, LoginRequest, LoginResponse, NewUtilisateur, SessionUser,
    UserStatus,
};
use ecole_common::models::{FieldErrors, REQUIRED};
use tracing::{error, info, warn};

const BAD_CREDENTIALS: &str = "Invalid username or password";

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    let username = req.username.trim();

    let Some(stored) = users::find_by_username(&state.db, username).await? else {
        warn!(username, "Login failed: unknown user");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
    };

    let valid = verify_password(&req.password, &stored.password_hash).map_err(|e| {
        error!(username, "Stored password hash unusable: {}", e);
        ApiError::Internal("Stored credentials are unusable".to_string())
    })?;
    if !valid {
        warn!(username, "Login failed: wrong password");
        return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
    }

    if stored.statut == UserStatus::Off {
        warn!(username, "Login refused: account disabled");
        return Err(ApiError::Forbidden("Account disabled".to_string()));
    }

    let now = users::touch_last_login(&state.db, stored.profile.id).await?;
    info!(username, id = stored.profile.id, "User logged in");

    Ok(Json(LoginResponse {
        user: SessionUser {
            derniereconnection: Some(now),
            ..stored.profile
        },
        message: "Login successful".to_string(),
    }))
}

pub async fn create_utilisateur(
    State(state): State<AppState>,
    payload: Result<Json<NewUtilisateur>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionUser>)> {
    let Json(new) = payload?;

    let mut errors = FieldErrors::new();
    for (field, value) in [
        ("username", new.username.as_str()),
        ("password", new.password.as_str()),
        ("contact", new.contact.as_str()),
    ] {
        if value.trim().is_empty() {
            errors.add(field, REQUIRED);
        }
    }
    errors.into_result()?;

    let encoded = encode_password(&new.password)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let user = users::create_user(&state.db, &new, &encoded).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Build authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login/", post(login))
        .route("/utilisateurs/", post(create_utilisateur))
}
