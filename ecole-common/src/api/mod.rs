//! Shared HTTP API types and password handling
//!
//! Pure functions and plain types only; the server wraps them with axum
//! handlers and the client sends/receives them over reqwest.

pub mod auth;
pub mod types;

pub use auth::{encode_password, verify_password, PasswordError};
pub use types::{LoginRequest, LoginResponse, NewUtilisateur, SessionUser, UserStatus};
