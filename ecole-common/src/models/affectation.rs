//! Affectation (class assignment) records and the reconciliation request

use super::{FieldErrors, ValidationError, REQUIRED};
use crate::keys::{self, AffectationKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Enrolment status of a student in a class for a year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EtatAffectation {
    /// Newly enrolled
    #[default]
    #[serde(rename = "Nouv")]
    Nouveau,
    /// Admitted from the previous level
    #[serde(rename = "adm")]
    Admis,
    /// Repeating the level
    #[serde(rename = "red")]
    Redoublant,
    /// Free candidate
    #[serde(rename = "Cdt")]
    CandidatLibre,
    #[serde(rename = "Aut")]
    Autre,
}

impl EtatAffectation {
    pub const ALL: [EtatAffectation; 5] = [
        EtatAffectation::Nouveau,
        EtatAffectation::Admis,
        EtatAffectation::Redoublant,
        EtatAffectation::CandidatLibre,
        EtatAffectation::Autre,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            EtatAffectation::Nouveau => "Nouv",
            EtatAffectation::Admis => "adm",
            EtatAffectation::Redoublant => "red",
            EtatAffectation::CandidatLibre => "Cdt",
            EtatAffectation::Autre => "Aut",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EtatAffectation::Nouveau => "Nouveau/elle",
            EtatAffectation::Admis => "Admis/e",
            EtatAffectation::Redoublant => "Redoublant/e",
            EtatAffectation::CandidatLibre => "Candidat/e libre",
            EtatAffectation::Autre => "Autre",
        }
    }

    /// Parse a status code. Codes compare case-insensitively (`"nouv"` is New).
    pub fn from_code(code: &str) -> Option<Self> {
        let code = code.trim();
        Self::ALL
            .into_iter()
            .find(|e| e.code().eq_ignore_ascii_case(code))
    }
}

/// One class assignment as served by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affectation {
    pub id: i64,
    pub eleve_aff: i64,
    pub classe_aff: Option<i64>,
    pub annee_aff: Option<i64>,
    #[serde(default)]
    pub etat_aff: EtatAffectation,
    #[serde(default)]
    pub date_aff: Option<DateTime<Utc>>,

    // Read-only display fields joined from the registry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eleve_fullname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eleve_matricule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classe_nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annee_nom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niveau_classe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_classe: Option<String>,
}

impl Affectation {
    /// The triplet key, when class and year are both set
    pub fn key(&self) -> Option<AffectationKey> {
        Some(AffectationKey::new(
            self.eleve_aff,
            self.classe_aff?,
            self.annee_aff?,
        ))
    }
}

/// Loosely typed affectation body as submitted by a form or a REST caller.
///
/// Fields stay raw JSON until [`AffectationPayload::validate`] turns them
/// into a [`ReconciliationRequest`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AffectationPayload {
    #[serde(default)]
    pub eleve_aff: Option<Value>,
    #[serde(default)]
    pub classe_aff: Option<Value>,
    #[serde(default)]
    pub annee_aff: Option<Value>,
    #[serde(default)]
    pub etat_aff: Option<Value>,
}

impl AffectationPayload {
    /// Build a payload from text inputs (CLI arguments, form fields)
    pub fn from_text(
        eleve: Option<&str>,
        classe: Option<&str>,
        annee: Option<&str>,
        etat: Option<&str>,
    ) -> Self {
        let to_value = |s: Option<&str>| s.map(|v| Value::String(v.to_string()));
        Self {
            eleve_aff: to_value(eleve),
            classe_aff: to_value(classe),
            annee_aff: to_value(annee),
            etat_aff: to_value(etat),
        }
    }

    /// Validate all fields, collecting every problem before failing
    pub fn validate(&self) -> Result<ReconciliationRequest, ValidationError> {
        let mut errors = FieldErrors::new();
        let eleve = required_key(&mut errors, "eleve_aff", self.eleve_aff.as_ref());
        let classe = required_key(&mut errors, "classe_aff", self.classe_aff.as_ref());
        let annee = required_key(&mut errors, "annee_aff", self.annee_aff.as_ref());

        let etat = match self.etat_aff.as_ref() {
            None | Some(Value::Null) => EtatAffectation::default(),
            Some(Value::String(s)) if s.trim().is_empty() => EtatAffectation::default(),
            Some(Value::String(s)) => match EtatAffectation::from_code(s) {
                Some(e) => e,
                None => {
                    errors.add("etat_aff", format!("\"{}\" is not a valid choice.", s));
                    EtatAffectation::default()
                }
            },
            Some(other) => {
                errors.add("etat_aff", format!("\"{}\" is not a valid choice.", other));
                EtatAffectation::default()
            }
        };

        errors.into_result()?;
        match (eleve, classe, annee) {
            (Some(eleve), Some(classe), Some(annee)) => Ok(ReconciliationRequest {
                key: AffectationKey::new(eleve, classe, annee),
                etat,
            }),
            // Every missing key recorded an error above
            _ => Err(ValidationError::single("non_field_errors", REQUIRED)),
        }
    }
}

fn required_key(errors: &mut FieldErrors, field: &str, value: Option<&Value>) -> Option<i64> {
    match value {
        None | Some(Value::Null) => {
            errors.add(field, REQUIRED);
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(field, REQUIRED);
            None
        }
        Some(v) => match keys::coerce_key(v) {
            Some(k) if k > 0 => Some(k),
            Some(k) => {
                errors.add(field, super::invalid_pk(k));
                None
            }
            None => {
                errors.add(field, "A valid integer is required.");
                None
            }
        },
    }
}

/// Ephemeral, validated input of the ensure-protocol.
///
/// Only constructed through validation, so every key is a positive integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationRequest {
    pub key: AffectationKey,
    pub etat: EtatAffectation,
}

impl ReconciliationRequest {
    pub fn new(
        eleve: i64,
        classe: i64,
        annee: i64,
        etat: EtatAffectation,
    ) -> Result<Self, ValidationError> {
        AffectationPayload {
            eleve_aff: Some(json!(eleve)),
            classe_aff: Some(json!(classe)),
            annee_aff: Some(json!(annee)),
            etat_aff: Some(json!(etat.code())),
        }
        .validate()
    }

    /// JSON body for the create and ensure endpoints
    pub fn to_body(&self) -> Value {
        json!({
            "eleve_aff": self.key.eleve,
            "classe_aff": self.key.classe,
            "annee_aff": self.key.annee,
            "etat_aff": self.etat.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults_status_to_new() {
        let req = AffectationPayload::from_text(Some("7"), Some("3"), Some("1"), None)
            .validate()
            .unwrap();
        assert_eq!(req.key, AffectationKey::new(7, 3, 1));
        assert_eq!(req.etat, EtatAffectation::Nouveau);
    }

    #[test]
    fn test_payload_reports_every_missing_field() {
        let err = AffectationPayload::from_text(Some("7"), None, Some("x"), Some("zzz"))
            .validate()
            .unwrap_err();
        let fields: Vec<&str> = err.errors().fields().collect();
        assert_eq!(fields, vec!["annee_aff", "classe_aff", "etat_aff"]);
    }

    #[test]
    fn test_payload_rejects_non_positive_ids() {
        let payload = AffectationPayload {
            eleve_aff: Some(json!(0)),
            classe_aff: Some(json!(3)),
            annee_aff: Some(json!(-1)),
            etat_aff: None,
        };
        let err = payload.validate().unwrap_err();
        assert!(err.errors().contains("eleve_aff"));
        assert!(err.errors().contains("annee_aff"));
    }

    #[test]
    fn test_status_codes_case_insensitive() {
        assert_eq!(EtatAffectation::from_code("nouv"), Some(EtatAffectation::Nouveau));
        assert_eq!(EtatAffectation::from_code("CDT"), Some(EtatAffectation::CandidatLibre));
        assert_eq!(EtatAffectation::from_code("x"), None);
    }

    #[test]
    fn test_request_body_shape() {
        let req = ReconciliationRequest::new(7, 3, 1, EtatAffectation::Redoublant).unwrap();
        assert_eq!(
            req.to_body(),
            json!({"eleve_aff": 7, "classe_aff": 3, "annee_aff": 1, "etat_aff": "red"})
        );
    }
}
