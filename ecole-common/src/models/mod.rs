//! Domain models shared by the server and the reconciliation client

pub mod affectation;
pub mod identity;
pub mod recouvrement;

pub use affectation::{Affectation, AffectationPayload, EtatAffectation, ReconciliationRequest};
pub use identity::{
    Annee, Classe, Eleve, FraisScolarite, NewAnnee, NewClasse, NewEleve, NewFrais, Niveau,
    OptionClasse, Sexe,
};
pub use recouvrement::{
    Installment, Recouvrement, RecouvrementPatch, StatutAr, Tuteur, INSTALLMENT_COUNT,
};

use serde::Serialize;
use std::collections::BTreeMap;

/// Per-field validation messages, keyed by wire field name.
///
/// Serializes as `{"field": ["message", ...]}`, the shape REST clients of
/// this backend already understand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// One line, `field: messages` pairs joined by "; "
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `Ok(())` when no error was recorded
    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ValidationError(self))
        }
    }
}

/// Input rejected before reaching storage or the network
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .0.summary())]
pub struct ValidationError(pub FieldErrors);

impl ValidationError {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        Self(errors)
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.0
    }
}

/// Message used when a referenced row does not exist
pub fn invalid_pk(id: i64) -> String {
    format!("Invalid pk \"{}\" - object does not exist.", id)
}

/// Message used when a required field is absent
pub const REQUIRED: &str = "This field is required.";
