//! Get-or-create orchestration for affectations and recouvrements
//!
//! Fallback chain, one step at a time:
//! 1. `ensure/` endpoint. Done on success. A duplicate goes straight to the
//!    lookup; an endpoint the backend does not offer goes to the create.
//! 2. Plain create. Done on success; continue only on the duplicate marker.
//! 3. Filtered lookup, re-verifying every candidate locally.
//! 4. Nothing matches: [`ReconcileError::NotFoundAfterCollision`].
//!
//! Any other failure stops the chain immediately.

use crate::backend::{Backend, CallOutcome};
use crate::error::{ReconcileError, Result};
use ecole_common::api::{LoginRequest, LoginResponse, SessionUser};
use ecole_common::keys::{coerce_key, positive_key};
use ecole_common::ledger::LedgerForm;
use ecole_common::models::{
    invalid_pk, Affectation, AffectationPayload, Recouvrement, RecouvrementPatch,
    ValidationError, REQUIRED,
};
use ecole_common::normalize::{self, RawRecord};
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Everything `assign` produces
#[derive(Debug, Clone)]
pub struct Assignment {
    pub affectation: Affectation,
    pub recouvrement: Recouvrement,
    pub ledger: LedgerForm,
}

fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Error for an outcome the current step has no rule for
fn unexpected<T>(outcome: CallOutcome<T>) -> ReconcileError {
    let status = outcome.failure_status().unwrap_or(200);
    let body = match outcome {
        CallOutcome::Collision(body) | CallOutcome::Rejected { body, .. } => body_text(&body),
        CallOutcome::NotFound => "not found".to_string(),
        CallOutcome::Unsupported => "endpoint not implemented".to_string(),
        CallOutcome::Success(_) => "unexpected success".to_string(),
    };
    ReconcileError::UnexpectedResponse { status, body }
}

/// A create call failed. 4xx bodies other than the duplicate marker are
/// logged and surfaced as such.
fn create_failure<T>(what: &str, outcome: CallOutcome<T>) -> ReconcileError {
    match outcome {
        CallOutcome::Rejected { status, body } if (400..500).contains(&status) => {
            let body = body_text(&body);
            error!(status, body = %body, "Unrecognized error creating {}", what);
            ReconcileError::UnrecognizedCreateError { status, body }
        }
        other => unexpected(other),
    }
}

/// Error for a duplicate with no exact match, carrying the backend's reason
fn not_found_after_collision(key: String, body: &Value) -> ReconcileError {
    let reason = body
        .get("non_field_errors")
        .and_then(Value::as_array)
        .and_then(|messages| messages.first())
        .and_then(Value::as_str)
        .unwrap_or("a duplicate was reported")
        .to_string();
    ReconcileError::NotFoundAfterCollision { key, reason }
}

/// True when every affectation reference on `candidate` points at `affectation_id`
fn references_affectation(candidate: &Value, affectation_id: i64) -> bool {
    let record = RawRecord::from(candidate);
    let direct = candidate
        .get("affectation")
        .map(|v| RawRecord::from(v).id());
    let aliases = ["id_affectation", "affectation_id"]
        .iter()
        .filter_map(|k| candidate.get(*k))
        .map(coerce_key);

    record.affectation_ref().is_some()
        && direct.into_iter().chain(aliases).all(|r| r == Some(affectation_id))
}

/// Drives the fallback chains against a [`Backend`]
pub struct Reconciler<B> {
    backend: B,
}

impl<B: Backend> Reconciler<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Get or create the affectation for (student, class, year).
    ///
    /// The payload is validated before any request; a missing or
    /// non-positive key fails without touching the network.
    pub async fn ensure_affectation(&self, payload: &AffectationPayload) -> Result<Affectation> {
        let req = payload.validate()?;
        let key = req.key;

        let collision = match self.backend.ensure_affectation(&req).await? {
            CallOutcome::Success(body) => {
                debug!(key = %key, "Affectation ensured by backend");
                return Ok(normalize::affectation(&body)?);
            }
            CallOutcome::Unsupported => {
                debug!(key = %key, "Ensure endpoint unavailable, falling back to create");
                match self.backend.create_affectation(&req).await? {
                    CallOutcome::Success(body) => {
                        info!(key = %key, "Affectation created");
                        return Ok(normalize::affectation(&body)?);
                    }
                    CallOutcome::Collision(body) => body,
                    other => return Err(create_failure("affectation", other)),
                }
            }
            CallOutcome::Collision(body) => body,
            other => return Err(unexpected(other)),
        };
        debug!(key = %key, "Duplicate reported, looking it up");

        let candidates = match self.backend.find_affectations(&key).await? {
            CallOutcome::Success(items) => items,
            other => return Err(unexpected(other)),
        };
        let found = candidates.iter().find(|c| key.matches(c)).ok_or_else(|| {
            warn!(key = %key, candidates = candidates.len(), "No exact match after collision");
            not_found_after_collision(key.to_string(), &collision)
        })?;
        Ok(normalize::affectation(found)?)
    }

    /// Get or create the recouvrement of an affectation
    pub async fn ensure_recouvrement(&self, affectation: &Value) -> Result<Recouvrement> {
        let affectation_id = match affectation {
            Value::Null => return Err(ValidationError::single("affectation", REQUIRED).into()),
            v => positive_key(v).ok_or_else(|| {
                ValidationError::single(
                    "affectation",
                    normalize::strict_amount(v)
                        .map(invalid_pk)
                        .unwrap_or_else(|| "A valid integer is required.".to_string()),
                )
            })?,
        };

        let collision = match self.backend.ensure_recouvrement(affectation_id).await? {
            CallOutcome::Success(body) => return Ok(normalize::recouvrement(&body)?),
            CallOutcome::Unsupported => {
                debug!(affectation_id, "Ensure endpoint unavailable, falling back to create");
                match self.backend.create_recouvrement(affectation_id).await? {
                    CallOutcome::Success(body) => {
                        info!(affectation_id, "Recouvrement created");
                        return Ok(normalize::recouvrement(&body)?);
                    }
                    CallOutcome::Collision(body) => body,
                    other => return Err(create_failure("recouvrement", other)),
                }
            }
            CallOutcome::Collision(body) => body,
            other => return Err(unexpected(other)),
        };
        debug!(affectation_id, "Duplicate reported, looking it up");

        let candidates = match self.backend.find_recouvrements(affectation_id).await? {
            CallOutcome::Success(items) => items,
            other => return Err(unexpected(other)),
        };
        let found = candidates
            .iter()
            .find(|c| references_affectation(c, affectation_id))
            .ok_or_else(|| {
                not_found_after_collision(format!("affectation {}", affectation_id), &collision)
            })?;
        Ok(normalize::recouvrement(found)?)
    }

    /// Fetch a recouvrement and open it for editing
    pub async fn open_ledger(&self, recouvrement_id: i64) -> Result<LedgerForm> {
        let rec = self.fetch_recouvrement(recouvrement_id).await?;
        Ok(LedgerForm::open(&rec))
    }

    async fn fetch_recouvrement(&self, id: i64) -> Result<Recouvrement> {
        match self.backend.get_recouvrement(id).await? {
            CallOutcome::Success(body) => Ok(normalize::recouvrement(&body)?),
            CallOutcome::NotFound => Err(ReconcileError::NotFound(format!("recouvrement {}", id))),
            other => Err(unexpected(other)),
        }
    }

    /// Ensure affectation, then its recouvrement, then open the ledger
    pub async fn assign(&self, payload: &AffectationPayload) -> Result<Assignment> {
        let affectation = self.ensure_affectation(payload).await?;
        let recouvrement = self
            .ensure_recouvrement(&Value::from(affectation.id))
            .await?;
        let ledger = self.open_ledger(recouvrement.id).await?;
        Ok(Assignment {
            affectation,
            recouvrement,
            ledger,
        })
    }

    /// Send the fields changed in `form` and reopen it from the saved record
    pub async fn save_ledger(&self, form: &LedgerForm) -> Result<LedgerForm> {
        if !form.is_dirty() {
            return Ok(form.clone());
        }
        let patch = form.to_patch()?;
        let rec = self.apply_patch(form.recouvrement_id(), &patch).await?;
        Ok(LedgerForm::open(&rec))
    }

    /// Record one installment; `slot` is 1-based
    pub async fn record_payment(
        &self,
        recouvrement_id: i64,
        slot: usize,
        amount: i64,
        date: Option<NaiveDate>,
    ) -> Result<Recouvrement> {
        let patch = RecouvrementPatch::installment(slot, amount, date)?;
        self.apply_patch(recouvrement_id, &patch).await
    }

    async fn apply_patch(&self, id: i64, patch: &RecouvrementPatch) -> Result<Recouvrement> {
        match self.backend.patch_recouvrement(id, patch).await? {
            CallOutcome::Success(body) => {
                let rec = normalize::recouvrement(&body)?;
                info!(id, total_paye = rec.total_paye(), "Recouvrement saved");
                Ok(rec)
            }
            CallOutcome::NotFound => Err(ReconcileError::NotFound(format!("recouvrement {}", id))),
            other => Err(unexpected(other)),
        }
    }

    /// Authenticate an operator
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionUser> {
        let req = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        match self.backend.login(&req).await? {
            CallOutcome::Success(body) => {
                let response: LoginResponse = serde_json::from_value(body).map_err(|e| {
                    ReconcileError::UnexpectedResponse {
                        status: 200,
                        body: e.to_string(),
                    }
                })?;
                Ok(response.user)
            }
            CallOutcome::Rejected { status: 401, .. } => Err(ReconcileError::Authentication(
                "invalid username or password".to_string(),
            )),
            CallOutcome::Rejected { status: 403, .. } => {
                Err(ReconcileError::Authentication("account disabled".to_string()))
            }
            other => Err(unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendError;
    use async_trait::async_trait;
    use ecole_common::keys::AffectationKey;
    use ecole_common::models::ReconciliationRequest;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory backend that counts calls per route
    #[derive(Default)]
    struct FakeBackend {
        ensure_supported: bool,
        affectations: Mutex<Vec<Value>>,
        recouvrements: Mutex<Vec<Value>>,
        /// Extra rows returned by filtered lookups, as a loose server would
        lookup_noise: Vec<Value>,
        ensure_calls: AtomicUsize,
        create_calls: AtomicUsize,
        find_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn total_calls(&self) -> usize {
            self.ensure_calls.load(Ordering::SeqCst)
                + self.create_calls.load(Ordering::SeqCst)
                + self.find_calls.load(Ordering::SeqCst)
        }

        fn upsert_affectation(&self, req: &ReconciliationRequest, ensure: bool) -> CallOutcome<Value> {
            let mut rows = self.affectations.lock().unwrap();
            if let Some(existing) = rows.iter().find(|r| req.key.matches(r)) {
                return if ensure {
                    CallOutcome::Success(existing.clone())
                } else {
                    CallOutcome::Collision(json!({"non_field_errors": ["duplicate"]}))
                };
            }
            let mut row = req.to_body();
            row["id"] = json!(rows.len() as i64 + 1);
            rows.push(row.clone());
            CallOutcome::Success(row)
        }

        fn upsert_recouvrement(&self, affectation: i64, ensure: bool) -> CallOutcome<Value> {
            let mut rows = self.recouvrements.lock().unwrap();
            if let Some(existing) = rows.iter().find(|r| r["affectation"] == json!(affectation)) {
                return if ensure {
                    CallOutcome::Success(existing.clone())
                } else {
                    CallOutcome::Collision(json!({"non_field_errors": ["duplicate"]}))
                };
            }
            let row = json!({
                "id": rows.len() as i64 + 1,
                "affectation": affectation,
                "frais_paiement": 500000,
            });
            rows.push(row.clone());
            CallOutcome::Success(row)
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn ensure_affectation(
            &self,
            req: &ReconciliationRequest,
        ) -> std::result::Result<CallOutcome<Value>, BackendError> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            if !self.ensure_supported {
                return Ok(CallOutcome::Unsupported);
            }
            Ok(self.upsert_affectation(req, true))
        }

        async fn create_affectation(
            &self,
            req: &ReconciliationRequest,
        ) -> std::result::Result<CallOutcome<Value>, BackendError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.upsert_affectation(req, false))
        }

        async fn find_affectations(
            &self,
            _key: &AffectationKey,
        ) -> std::result::Result<CallOutcome<Vec<Value>>, BackendError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            // Deliberately unfiltered: the caller must re-verify
            let mut rows = self.lookup_noise.clone();
            rows.extend(self.affectations.lock().unwrap().iter().cloned());
            Ok(CallOutcome::Success(rows))
        }

        async fn ensure_recouvrement(
            &self,
            affectation: i64,
        ) -> std::result::Result<CallOutcome<Value>, BackendError> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            if !self.ensure_supported {
                return Ok(CallOutcome::Unsupported);
            }
            Ok(self.upsert_recouvrement(affectation, true))
        }

        async fn create_recouvrement(
            &self,
            affectation: i64,
        ) -> std::result::Result<CallOutcome<Value>, BackendError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.upsert_recouvrement(affectation, false))
        }

        async fn find_recouvrements(
            &self,
            _affectation: i64,
        ) -> std::result::Result<CallOutcome<Vec<Value>>, BackendError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            Ok(CallOutcome::Success(self.recouvrements.lock().unwrap().clone()))
        }

        async fn get_recouvrement(
            &self,
            id: i64,
        ) -> std::result::Result<CallOutcome<Value>, BackendError> {
            let rows = self.recouvrements.lock().unwrap();
            Ok(match rows.iter().find(|r| r["id"] == json!(id)) {
                Some(row) => CallOutcome::Success(row.clone()),
                None => CallOutcome::NotFound,
            })
        }

        async fn patch_recouvrement(
            &self,
            id: i64,
            patch: &RecouvrementPatch,
        ) -> std::result::Result<CallOutcome<Value>, BackendError> {
            let mut rows = self.recouvrements.lock().unwrap();
            let Some(row) = rows.iter_mut().find(|r| r["id"] == json!(id)) else {
                return Ok(CallOutcome::NotFound);
            };
            if let (Value::Object(target), Value::Object(changes)) = (row, patch.to_json()) {
                target.extend(changes);
            }
            let row = rows.iter().find(|r| r["id"] == json!(id)).cloned();
            Ok(row.map(CallOutcome::Success).unwrap_or(CallOutcome::NotFound))
        }

        async fn login(
            &self,
            req: &LoginRequest,
        ) -> std::result::Result<CallOutcome<Value>, BackendError> {
            Ok(match (req.username.as_str(), req.password.as_str()) {
                ("secretariat", "s3cret") => CallOutcome::Success(json!({
                    "user": {"id": 1, "username": "secretariat", "fullname": "Mariama Bah", "role": "admin"},
                    "message": "Login successful",
                })),
                ("ancien", _) => CallOutcome::Rejected { status: 403, body: json!({}) },
                _ => CallOutcome::Rejected { status: 401, body: json!({}) },
            })
        }
    }

    fn payload(eleve: Value, classe: Value, annee: Value) -> AffectationPayload {
        AffectationPayload {
            eleve_aff: Some(eleve),
            classe_aff: Some(classe),
            annee_aff: Some(annee),
            etat_aff: None,
        }
    }

    #[tokio::test]
    async fn test_ensure_affectation_twice_returns_same_id() {
        let backend = FakeBackend {
            ensure_supported: true,
            ..Default::default()
        };
        let reconciler = Reconciler::new(backend);
        let p = payload(json!(7), json!(3), json!(1));

        let first = reconciler.ensure_affectation(&p).await.unwrap();
        let second = reconciler.ensure_affectation(&p).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(reconciler.backend().affectations.lock().unwrap().len(), 1);
        assert_eq!(reconciler.backend().create_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_finds_existing_without_duplicate() {
        let existing = json!({"id": 42, "eleve_aff": "7", "classe_aff": 3, "annee_aff": 1, "etat_aff": "Nouv"});
        let backend = FakeBackend {
            ensure_supported: false,
            affectations: Mutex::new(vec![existing]),
            lookup_noise: vec![
                json!({"id": 90, "eleve_aff": 71, "classe_aff": 3, "annee_aff": 1}),
                json!({"id": 91, "eleve_aff": "7a", "classe_aff": 3, "annee_aff": 1}),
            ],
            ..Default::default()
        };
        let reconciler = Reconciler::new(backend);

        let found = reconciler
            .ensure_affectation(&payload(json!("7"), json!("3"), json!(1)))
            .await
            .unwrap();
        assert_eq!(found.id, 42);

        let backend = reconciler.backend();
        assert_eq!(backend.affectations.lock().unwrap().len(), 1);
        assert_eq!(backend.ensure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.find_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_creates_when_absent() {
        let reconciler = Reconciler::new(FakeBackend::default());
        let created = reconciler
            .ensure_affectation(&payload(json!(7), json!(3), json!(1)))
            .await
            .unwrap();
        assert_eq!(created.eleve_aff, 7);
        assert_eq!(reconciler.backend().find_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_collision_without_match_is_fatal() {
        struct LyingBackend(FakeBackend);

        #[async_trait]
        impl Backend for LyingBackend {
            async fn ensure_affectation(
                &self,
                _req: &ReconciliationRequest,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::Unsupported)
            }
            async fn create_affectation(
                &self,
                _req: &ReconciliationRequest,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::Collision(json!({"non_field_errors": ["duplicate"]})))
            }
            async fn find_affectations(
                &self,
                key: &AffectationKey,
            ) -> std::result::Result<CallOutcome<Vec<Value>>, BackendError> {
                self.0.find_affectations(key).await
            }
            async fn ensure_recouvrement(
                &self,
                a: i64,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                self.0.ensure_recouvrement(a).await
            }
            async fn create_recouvrement(
                &self,
                a: i64,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                self.0.create_recouvrement(a).await
            }
            async fn find_recouvrements(
                &self,
                a: i64,
            ) -> std::result::Result<CallOutcome<Vec<Value>>, BackendError> {
                self.0.find_recouvrements(a).await
            }
            async fn get_recouvrement(
                &self,
                id: i64,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                self.0.get_recouvrement(id).await
            }
            async fn patch_recouvrement(
                &self,
                id: i64,
                patch: &RecouvrementPatch,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                self.0.patch_recouvrement(id, patch).await
            }
            async fn login(
                &self,
                req: &LoginRequest,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                self.0.login(req).await
            }
        }

        let reconciler = Reconciler::new(LyingBackend(FakeBackend::default()));
        let err = reconciler
            .ensure_affectation(&payload(json!(7), json!(3), json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::NotFoundAfterCollision { .. }));
    }

    #[tokio::test]
    async fn test_missing_class_fails_before_any_call() {
        let reconciler = Reconciler::new(FakeBackend::default());
        let p = AffectationPayload {
            eleve_aff: Some(json!(7)),
            classe_aff: None,
            annee_aff: Some(json!(1)),
            etat_aff: None,
        };
        let err = reconciler.ensure_affectation(&p).await.unwrap_err();
        match err {
            ReconcileError::Validation(v) => assert!(v.errors().contains("classe_aff")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert_eq!(reconciler.backend().total_calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_recouvrement_twice_returns_same_id() {
        for ensure_supported in [true, false] {
            let reconciler = Reconciler::new(FakeBackend {
                ensure_supported,
                ..Default::default()
            });
            let first = reconciler.ensure_recouvrement(&json!(5)).await.unwrap();
            let second = reconciler.ensure_recouvrement(&json!("5")).await.unwrap();
            assert_eq!(first.id, second.id);
            assert_eq!(second.affectation, Some(5));
            assert_eq!(reconciler.backend().recouvrements.lock().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_recouvrement_needs_positive_affectation() {
        let reconciler = Reconciler::new(FakeBackend::default());
        for bad in [Value::Null, json!(0), json!("abc")] {
            let err = reconciler.ensure_recouvrement(&bad).await.unwrap_err();
            assert!(matches!(err, ReconcileError::Validation(_)));
        }
        assert_eq!(reconciler.backend().total_calls(), 0);
    }

    #[test]
    fn test_references_affectation_checks_every_field() {
        assert!(references_affectation(&json!({"id": 2, "affectation": 5}), 5));
        assert!(references_affectation(&json!({"id": 2, "affectation": {"id": "5"}}), 5));
        assert!(references_affectation(
            &json!({"id": 2, "affectation": 5, "id_affectation": "5"}),
            5
        ));
        assert!(!references_affectation(
            &json!({"id": 1, "affectation_id": 5, "affectation": 6}),
            5
        ));
        assert!(!references_affectation(&json!({"id": 3, "affectation": null}), 5));
        assert!(!references_affectation(&json!({"id": 4}), 5));
    }

    #[tokio::test]
    async fn test_recouvrement_lookup_skips_conflicting_references() {
        let backend = FakeBackend::default();
        backend.recouvrements.lock().unwrap().extend([
            json!({"id": 1, "affectation_id": 5, "affectation": 6}),
            json!({"id": 2, "affectation": 5}),
        ]);
        let reconciler = Reconciler::new(backend);

        let rec = reconciler.ensure_recouvrement(&json!(5)).await.unwrap();
        assert_eq!(rec.id, 2);
        assert_eq!(rec.affectation, Some(5));
        assert_eq!(reconciler.backend().find_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_assign_then_pay() {
        let reconciler = Reconciler::new(FakeBackend {
            ensure_supported: true,
            ..Default::default()
        });
        let assignment = reconciler
            .assign(&payload(json!(7), json!(3), json!(1)))
            .await
            .unwrap();
        assert_eq!(assignment.ledger.summary().balance, 500_000);

        let rec_id = assignment.recouvrement.id;
        reconciler.record_payment(rec_id, 1, 200_000, None).await.unwrap();
        let mut form = reconciler.open_ledger(rec_id).await.unwrap();
        assert!(form.set_field("v2", "100000"));
        assert_eq!(form.summary().balance, 200_000);

        let saved = reconciler.save_ledger(&form).await.unwrap();
        assert_eq!(saved.summary().total_paid, 300_000);
        assert!(!saved.is_dirty());
    }

    #[tokio::test]
    async fn test_unrecognized_create_error_is_surfaced() {
        struct Refusing;

        #[async_trait]
        impl Backend for Refusing {
            async fn ensure_affectation(
                &self,
                _req: &ReconciliationRequest,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::Unsupported)
            }
            async fn create_affectation(
                &self,
                _req: &ReconciliationRequest,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::Rejected {
                    status: 400,
                    body: json!({"classe_aff": ["Invalid pk"]}),
                })
            }
            async fn find_affectations(
                &self,
                _key: &AffectationKey,
            ) -> std::result::Result<CallOutcome<Vec<Value>>, BackendError> {
                Ok(CallOutcome::Success(vec![]))
            }
            async fn ensure_recouvrement(
                &self,
                _a: i64,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::Unsupported)
            }
            async fn create_recouvrement(
                &self,
                _a: i64,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Err(BackendError::Transport("connection refused".to_string()))
            }
            async fn find_recouvrements(
                &self,
                _a: i64,
            ) -> std::result::Result<CallOutcome<Vec<Value>>, BackendError> {
                Ok(CallOutcome::Success(vec![]))
            }
            async fn get_recouvrement(
                &self,
                _id: i64,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::NotFound)
            }
            async fn patch_recouvrement(
                &self,
                _id: i64,
                _patch: &RecouvrementPatch,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::NotFound)
            }
            async fn login(
                &self,
                _req: &LoginRequest,
            ) -> std::result::Result<CallOutcome<Value>, BackendError> {
                Ok(CallOutcome::Unsupported)
            }
        }

        let reconciler = Reconciler::new(Refusing);
        let err = reconciler
            .ensure_affectation(&payload(json!(7), json!(3), json!(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ReconcileError::UnrecognizedCreateError { status: 400, .. }
        ));

        let err = reconciler.ensure_recouvrement(&json!(1)).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Transport(_)));

        let err = reconciler.open_ledger(9).await.unwrap_err();
        assert!(matches!(err, ReconcileError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_login_outcomes() {
        let reconciler = Reconciler::new(FakeBackend::default());
        let user = reconciler.login(" secretariat ", "s3cret").await.unwrap();
        assert_eq!(user.fullname, "Mariama Bah");

        let err = reconciler.login("secretariat", "nope").await.unwrap_err();
        assert!(err.to_string().contains("invalid username or password"));
        let err = reconciler.login("ancien", "x").await.unwrap_err();
        assert!(err.to_string().contains("account disabled"));
    }
}
