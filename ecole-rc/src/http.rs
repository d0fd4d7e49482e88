//! reqwest implementation of [`Backend`]

use crate::backend::{Backend, BackendError, CallOutcome};
use async_trait::async_trait;
use ecole_common::api::LoginRequest;
use ecole_common::keys::AffectationKey;
use ecole_common::models::{RecouvrementPatch, ReconciliationRequest};
use ecole_common::normalize::list_items;
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("ecole-rc/", env!("CARGO_PKG_VERSION"));

/// How a 404 should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    /// `ensure/` routes: a 404 means the backend does not offer them
    Ensure,
    /// Everything else: a 404 means the record does not exist
    Resource,
}

/// True for the duplicate marker: a 400 whose JSON object has `non_field_errors`
pub fn is_collision(status: StatusCode, body: &Value) -> bool {
    status == StatusCode::BAD_REQUEST
        && body
            .as_object()
            .is_some_and(|o| o.contains_key("non_field_errors"))
}

/// Map a status and decoded body to a [`CallOutcome`]
fn classify(status: StatusCode, body: Value, route: Route) -> CallOutcome<Value> {
    if status.is_success() {
        return CallOutcome::Success(body);
    }
    if is_collision(status, &body) {
        return CallOutcome::Collision(body);
    }
    match status {
        StatusCode::NOT_FOUND if route == Route::Ensure => CallOutcome::Unsupported,
        StatusCode::NOT_FOUND => CallOutcome::NotFound,
        StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => CallOutcome::Unsupported,
        _ => CallOutcome::Rejected {
            status: status.as_u16(),
            body,
        },
    }
}

/// REST client for ecole-srv
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
        route: Route,
    ) -> Result<CallOutcome<Value>, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Backend request");

        let mut request = self.client.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(&text) {
                Ok(v) => v,
                Err(e) if status.is_success() => {
                    debug!(url = %url, "Undecodable success body: {}", e);
                    return Err(BackendError::Decode {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                // Error pages are often plain text or HTML
                Err(_) => Value::String(text),
            }
        };

        debug!(status = status.as_u16(), url = %url, "Backend response");
        Ok(classify(status, body, route))
    }

    async fn list(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<CallOutcome<Vec<Value>>, BackendError> {
        Ok(match self.call(Method::GET, path, query, None, Route::Resource).await? {
            CallOutcome::Success(body) => CallOutcome::Success(list_items(&body)),
            CallOutcome::Collision(body) => CallOutcome::Collision(body),
            CallOutcome::NotFound => CallOutcome::NotFound,
            CallOutcome::Unsupported => CallOutcome::Unsupported,
            CallOutcome::Rejected { status, body } => CallOutcome::Rejected { status, body },
        })
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ensure_affectation(
        &self,
        req: &ReconciliationRequest,
    ) -> Result<CallOutcome<Value>, BackendError> {
        self.call(Method::POST, "/affectations/ensure/", &[], Some(req.to_body()), Route::Ensure)
            .await
    }

    async fn create_affectation(
        &self,
        req: &ReconciliationRequest,
    ) -> Result<CallOutcome<Value>, BackendError> {
        self.call(Method::POST, "/affectations/", &[], Some(req.to_body()), Route::Resource)
            .await
    }

    async fn find_affectations(
        &self,
        key: &AffectationKey,
    ) -> Result<CallOutcome<Vec<Value>>, BackendError> {
        self.list("/affectations/", &key.query_pairs()).await
    }

    async fn ensure_recouvrement(
        &self,
        affectation: i64,
    ) -> Result<CallOutcome<Value>, BackendError> {
        let body = json!({ "affectation": affectation });
        self.call(Method::POST, "/recouvrements/ensure/", &[], Some(body), Route::Ensure)
            .await
    }

    async fn create_recouvrement(
        &self,
        affectation: i64,
    ) -> Result<CallOutcome<Value>, BackendError> {
        let body = json!({ "affectation": affectation });
        self.call(Method::POST, "/recouvrements/", &[], Some(body), Route::Resource)
            .await
    }

    async fn find_recouvrements(
        &self,
        affectation: i64,
    ) -> Result<CallOutcome<Vec<Value>>, BackendError> {
        self.list("/recouvrements/", &[("affectation", affectation.to_string())])
            .await
    }

    async fn get_recouvrement(&self, id: i64) -> Result<CallOutcome<Value>, BackendError> {
        let path = format!("/recouvrements/{}/", id);
        self.call(Method::GET, &path, &[], None, Route::Resource).await
    }

    async fn patch_recouvrement(
        &self,
        id: i64,
        patch: &RecouvrementPatch,
    ) -> Result<CallOutcome<Value>, BackendError> {
        let path = format!("/recouvrements/{}/", id);
        self.call(Method::PATCH, &path, &[], Some(patch.to_json()), Route::Resource)
            .await
    }

    async fn login(&self, req: &LoginRequest) -> Result<CallOutcome<Value>, BackendError> {
        let body = json!({ "username": req.username, "password": req.password });
        self.call(Method::POST, "/login/", &[], Some(body), Route::Resource)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collision_marker_is_narrow() {
        let marker = json!({"non_field_errors": ["duplicate"]});
        assert!(is_collision(StatusCode::BAD_REQUEST, &marker));
        assert!(!is_collision(StatusCode::CONFLICT, &marker));
        assert!(!is_collision(StatusCode::BAD_REQUEST, &json!({"eleve_aff": ["required"]})));
        assert!(!is_collision(StatusCode::BAD_REQUEST, &json!("non_field_errors")));
    }

    #[test]
    fn test_not_found_depends_on_route() {
        assert_eq!(
            classify(StatusCode::NOT_FOUND, Value::Null, Route::Ensure),
            CallOutcome::Unsupported
        );
        assert_eq!(
            classify(StatusCode::NOT_FOUND, Value::Null, Route::Resource),
            CallOutcome::NotFound
        );
        assert_eq!(
            classify(StatusCode::NOT_IMPLEMENTED, Value::Null, Route::Resource),
            CallOutcome::Unsupported
        );
    }

    #[test]
    fn test_other_failures_are_rejected() {
        let outcome = classify(StatusCode::FORBIDDEN, json!({"detail": "no"}), Route::Resource);
        assert_eq!(
            outcome,
            CallOutcome::Rejected {
                status: 403,
                body: json!({"detail": "no"})
            }
        );
        assert_eq!(outcome.failure_status(), Some(403));
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let backend = HttpBackend::new("http://127.0.0.1:5740/", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.base_url(), "http://127.0.0.1:5740");
    }
}
