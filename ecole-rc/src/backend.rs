//! Backend seam of the reconciliation client
//!
//! Each call maps to one HTTP request. Outcomes the protocol reacts to are
//! values of [`CallOutcome`]; only failures with no HTTP answer at all are
//! errors.

use async_trait::async_trait;
use ecole_common::api::LoginRequest;
use ecole_common::keys::AffectationKey;
use ecole_common::models::{RecouvrementPatch, ReconciliationRequest};
use serde_json::Value;
use thiserror::Error;

/// Answer of one backend call
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// 2xx with a decoded body
    Success(T),
    /// 400 carrying `non_field_errors`: a uniqueness constraint fired
    Collision(Value),
    /// 404 on a resource route
    NotFound,
    /// The route is not implemented by this backend (404/405/501 on `ensure/`,
    /// 405/501 elsewhere)
    Unsupported,
    /// Any other non-success answer
    Rejected { status: u16, body: Value },
}

impl<T> CallOutcome<T> {
    /// HTTP status this outcome stands for, when it is a failure
    pub fn failure_status(&self) -> Option<u16> {
        match self {
            CallOutcome::Success(_) => None,
            CallOutcome::Collision(_) => Some(400),
            CallOutcome::NotFound => Some(404),
            CallOutcome::Unsupported => Some(501),
            CallOutcome::Rejected { status, .. } => Some(*status),
        }
    }
}

/// The request produced no usable HTTP answer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(String),

    /// A success status carried a body that is not JSON
    #[error("invalid response body ({status}): {body}")]
    Decode { status: u16, body: String },
}

/// REST operations the client relies on
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /affectations/ensure/`
    async fn ensure_affectation(
        &self,
        req: &ReconciliationRequest,
    ) -> Result<CallOutcome<Value>, BackendError>;

    /// `POST /affectations/`
    async fn create_affectation(
        &self,
        req: &ReconciliationRequest,
    ) -> Result<CallOutcome<Value>, BackendError>;

    /// `GET /affectations/?eleve_aff=&classe_aff=&annee_aff=`
    async fn find_affectations(
        &self,
        key: &AffectationKey,
    ) -> Result<CallOutcome<Vec<Value>>, BackendError>;

    /// `POST /recouvrements/ensure/`
    async fn ensure_recouvrement(&self, affectation: i64)
        -> Result<CallOutcome<Value>, BackendError>;

    /// `POST /recouvrements/`
    async fn create_recouvrement(&self, affectation: i64)
        -> Result<CallOutcome<Value>, BackendError>;

    /// `GET /recouvrements/?affectation=`
    async fn find_recouvrements(
        &self,
        affectation: i64,
    ) -> Result<CallOutcome<Vec<Value>>, BackendError>;

    /// `GET /recouvrements/{id}/`
    async fn get_recouvrement(&self, id: i64) -> Result<CallOutcome<Value>, BackendError>;

    /// `PATCH /recouvrements/{id}/`
    async fn patch_recouvrement(
        &self,
        id: i64,
        patch: &RecouvrementPatch,
    ) -> Result<CallOutcome<Value>, BackendError>;

    /// `POST /login/`
    async fn login(&self, req: &LoginRequest) -> Result<CallOutcome<Value>, BackendError>;
}
