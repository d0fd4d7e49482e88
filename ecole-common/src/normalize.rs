//! Raw JSON record normalization
//!
//! Backend payloads are not uniform: ids may be numbers or strings, references
//! may be bare ids or nested objects, list endpoints may answer with an array
//! or a `{"results": [...]}` page. Everything is funnelled through the
//! functions here so business code only ever sees the canonical models.
//!
//! Priority orders:
//! - record id: `id`, then `pk`
//! - affectation reference: `id_affectation`, `affectation_id`, `affectation`
//!   (number or numeric string), then `affectation.id` (nested object)

use crate::keys;
use crate::models::{
    Affectation, EtatAffectation, Installment, Recouvrement, StatutAr, Tuteur, INSTALLMENT_COUNT,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

/// A payload could not be turned into a canonical record
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("record has no usable id")]
    MissingId,

    #[error("record has no usable `{0}`")]
    MissingField(&'static str),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(String),
}

/// One raw value as it came off the wire
#[derive(Debug, Clone, Copy)]
pub enum RawRecord<'a> {
    /// A full or partial record
    Object(&'a Map<String, Value>),
    /// A bare reference (`12` or `"12"`)
    Id(i64),
    /// `null`, garbage, or anything else without an id
    Opaque(&'a Value),
}

impl<'a> From<&'a Value> for RawRecord<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => RawRecord::Object(map),
            other => match keys::coerce_key(other) {
                Some(id) => RawRecord::Id(id),
                None => RawRecord::Opaque(other),
            },
        }
    }
}

impl<'a> RawRecord<'a> {
    /// Id of the record itself (`id`, then `pk`), or the bare reference
    pub fn id(&self) -> Option<i64> {
        match self {
            RawRecord::Object(map) => ["id", "pk"]
                .iter()
                .find_map(|k| map.get(*k).and_then(keys::coerce_key)),
            RawRecord::Id(id) => Some(*id),
            RawRecord::Opaque(_) => None,
        }
    }

    /// Id of the affectation this record points at
    pub fn affectation_ref(&self) -> Option<i64> {
        let RawRecord::Object(map) = self else {
            return None;
        };
        ["id_affectation", "affectation_id"]
            .iter()
            .find_map(|k| map.get(*k).and_then(keys::coerce_key))
            .or_else(|| map.get("affectation").and_then(|v| RawRecord::from(v).id()))
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        match self {
            RawRecord::Object(map) => map.get(field),
            _ => None,
        }
    }

    /// Referenced id stored under `field`, bare or nested
    fn reference(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(|v| RawRecord::from(v).id())
    }

    fn text(&self, field: &str) -> Option<String> {
        self.get(field).and_then(text).filter(|s| !s.is_empty())
    }
}

/// Items of a list response: a bare array or a `{"results": [...]}` page
pub fn list_items(body: &Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items.clone(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Whole amount: integers, integral floats, and numeric strings (`"1500"`, `"1500.00"`)
pub fn strict_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Like [`strict_amount`], but anything unusable counts as 0
pub fn lenient_amount(value: &Value) -> i64 {
    strict_amount(value).unwrap_or(0)
}

/// Scalar as text; `null`, arrays and objects have none
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `YYYY-MM-DD`, also accepting a full timestamp
pub fn date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.date_naive()))
}

pub fn datetime(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

fn object(value: &Value) -> Result<RawRecord<'_>, ShapeError> {
    match RawRecord::from(value) {
        raw @ RawRecord::Object(_) => Ok(raw),
        _ => Err(ShapeError::NotAnObject(value.to_string())),
    }
}

/// Canonical affectation from a raw payload
pub fn affectation(value: &Value) -> Result<Affectation, ShapeError> {
    let raw = object(value)?;
    let id = raw.id().ok_or(ShapeError::MissingId)?;
    let eleve_aff = raw
        .reference("eleve_aff")
        .ok_or(ShapeError::MissingField("eleve_aff"))?;

    let etat_aff = raw
        .get("etat_aff")
        .and_then(|v| v.as_str())
        .and_then(EtatAffectation::from_code)
        .unwrap_or(EtatAffectation::Autre);

    // Older payloads nest the student under `eleve_details`
    let details = raw.get("eleve_details").map(RawRecord::from);
    let from_details = |field: &str| details.as_ref().and_then(|d| d.text(field));

    Ok(Affectation {
        id,
        eleve_aff,
        classe_aff: raw.reference("classe_aff"),
        annee_aff: raw.reference("annee_aff"),
        etat_aff,
        date_aff: raw.get("date_aff").and_then(datetime),
        eleve_fullname: raw
            .text("eleve_fullname")
            .or_else(|| from_details("fullname")),
        eleve_matricule: raw
            .text("eleve_matricule")
            .or_else(|| from_details("matricule")),
        classe_nom: raw.text("classe_nom"),
        annee_nom: raw.text("annee_nom"),
        niveau_classe: raw.text("niveau_classe"),
        option_classe: raw.text("option_classe"),
    })
}

/// Canonical recouvrement from a raw payload
pub fn recouvrement(value: &Value) -> Result<Recouvrement, ShapeError> {
    let raw = object(value)?;
    let id = raw.id().ok_or(ShapeError::MissingId)?;

    let amount = |field: &str| raw.get(field).map(lenient_amount).unwrap_or(0);
    let optional_amount = |field: &str| raw.get(field).and_then(strict_amount);

    let mut installments = [Installment::default(); INSTALLMENT_COUNT];
    for (i, slot) in installments.iter_mut().enumerate() {
        slot.amount = amount(&format!("v{}", i + 1));
        slot.date = raw.get(&format!("d{}", i + 1)).and_then(date);
    }

    Ok(Recouvrement {
        id,
        affectation: raw.affectation_ref(),
        statut_ar: raw
            .get("statut_ar")
            .and_then(|v| v.as_str())
            .and_then(StatutAr::from_code)
            .unwrap_or_default(),
        montant_statut_ar: amount("montant_statut_ar"),
        reduction: amount("reduction"),
        frais_paiement: optional_amount("frais_paiement"),
        tranches: [
            optional_amount("tranche1_paiement"),
            optional_amount("tranche2_paiement"),
            optional_amount("tranche3_paiement"),
        ],
        tuteur: Tuteur {
            nom: raw.text("tuteur_paiement"),
            contact: raw.text("contact_tuteur_paiement"),
            adresse: raw.text("adresse_tuteur_paiement"),
            profession: raw.text("profession_tuteur_paiement"),
        },
        installments,
        info_eleve: raw.text("info_eleve"),
        info_matricule: raw.text("info_matricule"),
        info_classe: raw.text("info_classe"),
    })
}
