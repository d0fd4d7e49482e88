//! # École reconciliation client
//!
//! Idempotent get-or-create of affectations and recouvrements against an
//! ecole-srv backend, with a fallback for backends without `ensure/`
//! endpoints, plus ledger editing and operator sessions.

pub mod backend;
pub mod error;
pub mod http;
pub mod liveness;
pub mod reconcile;
pub mod session;

pub use backend::{Backend, BackendError, CallOutcome};
pub use error::{ReconcileError, Result};
pub use http::HttpBackend;
pub use liveness::{LiveSlot, ViewLifetime};
pub use reconcile::{Assignment, Reconciler};
pub use session::AuthContext;
