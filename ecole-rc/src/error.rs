//! Error types for ecole-rc

use crate::backend::BackendError;
use ecole_common::models::ValidationError;
use ecole_common::normalize::ShapeError;
use thiserror::Error;

/// Failures surfaced by the reconciliation client
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Input rejected locally; no request was sent
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// The backend reported a duplicate but no record matches the key
    #[error("No matching record for {key}: {reason}")]
    NotFoundAfterCollision { key: String, reason: String },

    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Transport(String),

    /// The backend answered with a status the current step does not handle
    #[error("Unexpected response ({status}): {body}")]
    UnexpectedResponse { status: u16, body: String },

    /// A create call failed with a client error that is not a duplicate
    #[error("Create rejected ({status}): {body}")]
    UnrecognizedCreateError { status: u16, body: String },

    /// A record came back in a shape that cannot be normalized
    #[error("Malformed record: {0}")]
    Shape(#[from] ShapeError),

    /// The requested record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Login refused or no operator signed in
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The session file could not be read or written
    #[error("Session error: {0}")]
    Session(String),
}

impl From<BackendError> for ReconcileError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Transport(msg) => ReconcileError::Transport(msg),
            BackendError::Decode { status, body } => {
                ReconcileError::UnexpectedResponse { status, body }
            }
        }
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
