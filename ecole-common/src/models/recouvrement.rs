//! Recouvrement (payment tracking) records and partial updates

use super::{FieldErrors, ValidationError};
use crate::ledger::{self, LedgerSummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};

/// Number of installment slots on a recouvrement
pub const INSTALLMENT_COUNT: usize = 12;

/// Registration status that the arrears amount refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StatutAr {
    #[serde(rename = "Ins")]
    Inscription,
    #[serde(rename = "Reins")]
    Reinscription,
    #[default]
    #[serde(rename = "Aut")]
    Autre,
}

impl StatutAr {
    pub fn code(&self) -> &'static str {
        match self {
            StatutAr::Inscription => "Ins",
            StatutAr::Reinscription => "Reins",
            StatutAr::Autre => "Aut",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatutAr::Inscription => "Inscription",
            StatutAr::Reinscription => "Réinscription",
            StatutAr::Autre => "Autre",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [StatutAr::Inscription, StatutAr::Reinscription, StatutAr::Autre]
            .into_iter()
            .find(|s| s.code().eq_ignore_ascii_case(code.trim()))
    }
}

/// One payment slot (`v{n}` / `d{n}` on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Installment {
    pub amount: i64,
    pub date: Option<NaiveDate>,
}

/// Guardian who pays the tuition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tuteur {
    #[serde(rename = "tuteur_paiement")]
    pub nom: Option<String>,
    #[serde(rename = "contact_tuteur_paiement")]
    pub contact: Option<String>,
    #[serde(rename = "adresse_tuteur_paiement")]
    pub adresse: Option<String>,
    #[serde(rename = "profession_tuteur_paiement")]
    pub profession: Option<String>,
}

/// Payment record owned by one affectation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recouvrement {
    pub id: i64,
    pub affectation: Option<i64>,
    pub statut_ar: StatutAr,
    pub montant_statut_ar: i64,
    /// Percent in `[0, 100]`
    pub reduction: i64,
    /// Fee due after reduction, derived from the fee schedule on save
    pub frais_paiement: Option<i64>,
    pub tranches: [Option<i64>; 3],
    pub tuteur: Tuteur,
    pub installments: [Installment; INSTALLMENT_COUNT],

    pub info_eleve: Option<String>,
    pub info_matricule: Option<String>,
    pub info_classe: Option<String>,
}

impl Recouvrement {
    /// New, empty record for an affectation
    pub fn for_affectation(affectation: i64) -> Self {
        Self {
            affectation: Some(affectation),
            ..Default::default()
        }
    }

    pub fn amounts(&self) -> [i64; INSTALLMENT_COUNT] {
        self.installments.map(|i| i.amount)
    }

    pub fn total_paye(&self) -> i64 {
        ledger::total_paid(self.amounts())
    }

    pub fn summary(&self) -> LedgerSummary {
        LedgerSummary::compute(self.frais_paiement.unwrap_or(0), self.amounts())
    }

    /// Wire representation, including the computed `total_paye`
    pub fn to_wire(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".into(), json!(self.id));
        map.insert("affectation".into(), json!(self.affectation));
        map.insert("statut_ar".into(), json!(self.statut_ar.code()));
        map.insert("montant_statut_ar".into(), json!(self.montant_statut_ar));
        map.insert("reduction".into(), json!(self.reduction));
        map.insert("frais_paiement".into(), json!(self.frais_paiement));
        for (i, tranche) in self.tranches.iter().enumerate() {
            map.insert(format!("tranche{}_paiement", i + 1), json!(tranche));
        }
        map.insert("tuteur_paiement".into(), json!(self.tuteur.nom));
        map.insert("contact_tuteur_paiement".into(), json!(self.tuteur.contact));
        map.insert("adresse_tuteur_paiement".into(), json!(self.tuteur.adresse));
        map.insert(
            "profession_tuteur_paiement".into(),
            json!(self.tuteur.profession),
        );
        for (i, inst) in self.installments.iter().enumerate() {
            map.insert(format!("v{}", i + 1), json!(inst.amount));
            map.insert(
                format!("d{}", i + 1),
                json!(inst.date.map(|d| d.format("%Y-%m-%d").to_string())),
            );
        }
        map.insert("total_paye".into(), json!(self.total_paye()));
        for (key, value) in [
            ("info_eleve", &self.info_eleve),
            ("info_matricule", &self.info_matricule),
            ("info_classe", &self.info_classe),
        ] {
            if let Some(v) = value {
                map.insert(key.into(), json!(v));
            }
        }
        Value::Object(map)
    }
}

impl Serialize for Recouvrement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

/// Partial update of a recouvrement (`PATCH /recouvrements/{id}/`).
///
/// `None` leaves a field untouched. For nullable fields `Some(None)` clears it.
/// Slots are zero-based in `amounts`/`dates`; `v1`/`d1` is index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecouvrementPatch {
    pub statut_ar: Option<StatutAr>,
    pub montant_statut_ar: Option<i64>,
    pub reduction: Option<i64>,
    pub tuteur_paiement: Option<Option<String>>,
    pub contact_tuteur_paiement: Option<Option<String>>,
    pub adresse_tuteur_paiement: Option<Option<String>>,
    pub profession_tuteur_paiement: Option<Option<String>>,
    pub amounts: [Option<i64>; INSTALLMENT_COUNT],
    pub dates: [Option<Option<NaiveDate>>; INSTALLMENT_COUNT],
}

const TUTEUR_FIELDS: [(&str, usize); 4] = [
    ("tuteur_paiement", 200),
    ("contact_tuteur_paiement", 15),
    ("adresse_tuteur_paiement", 300),
    ("profession_tuteur_paiement", 100),
];

impl RecouvrementPatch {
    /// Patch setting a single installment; `slot` is 1-based like the wire names
    pub fn installment(
        slot: usize,
        amount: i64,
        date: Option<NaiveDate>,
    ) -> Result<Self, ValidationError> {
        if !(1..=INSTALLMENT_COUNT).contains(&slot) {
            return Err(ValidationError::single(
                "non_field_errors",
                format!("Installment slot must be between 1 and {}.", INSTALLMENT_COUNT),
            ));
        }
        if amount < 0 {
            return Err(ValidationError::single(
                &format!("v{}", slot),
                "Ensure this value is greater than or equal to 0.",
            ));
        }
        let mut patch = Self::default();
        patch.amounts[slot - 1] = Some(amount);
        patch.dates[slot - 1] = Some(date);
        Ok(patch)
    }

    /// Parse and validate a JSON patch body. Unknown and read-only keys are ignored.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let obj = body.as_object().ok_or_else(|| {
            ValidationError::single("non_field_errors", "Invalid data. Expected a dictionary.")
        })?;
        let mut errors = FieldErrors::new();
        let mut patch = Self::default();

        if let Some(v) = obj.get("statut_ar") {
            patch.statut_ar = match v {
                Value::Null => Some(StatutAr::default()),
                Value::String(s) if s.trim().is_empty() => Some(StatutAr::default()),
                Value::String(s) => match StatutAr::from_code(s) {
                    Some(st) => Some(st),
                    None => {
                        errors.add("statut_ar", format!("\"{}\" is not a valid choice.", s));
                        None
                    }
                },
                other => {
                    errors.add("statut_ar", format!("\"{}\" is not a valid choice.", other));
                    None
                }
            };
        }

        if let Some(v) = obj.get("montant_statut_ar") {
            patch.montant_statut_ar = bounded_amount(&mut errors, "montant_statut_ar", v, None);
        }
        if let Some(v) = obj.get("reduction") {
            patch.reduction = bounded_amount(&mut errors, "reduction", v, Some(100));
        }

        for (field, max_len) in TUTEUR_FIELDS {
            let Some(v) = obj.get(field) else { continue };
            let parsed = match v {
                Value::Null => Some(None),
                Value::String(s) if s.trim().is_empty() => Some(None),
                Value::String(s) if s.chars().count() > max_len => {
                    errors.add(
                        field,
                        format!("Ensure this field has no more than {} characters.", max_len),
                    );
                    None
                }
                Value::String(s) => Some(Some(s.trim().to_string())),
                _ => {
                    errors.add(field, "Not a valid string.");
                    None
                }
            };
            match field {
                "tuteur_paiement" => patch.tuteur_paiement = parsed,
                "contact_tuteur_paiement" => patch.contact_tuteur_paiement = parsed,
                "adresse_tuteur_paiement" => patch.adresse_tuteur_paiement = parsed,
                _ => patch.profession_tuteur_paiement = parsed,
            }
        }

        for i in 0..INSTALLMENT_COUNT {
            let v_field = format!("v{}", i + 1);
            if let Some(v) = obj.get(&v_field) {
                patch.amounts[i] = bounded_amount(&mut errors, &v_field, v, None);
            }
            let d_field = format!("d{}", i + 1);
            if let Some(v) = obj.get(&d_field) {
                patch.dates[i] = match v {
                    Value::Null => Some(None),
                    Value::String(s) if s.trim().is_empty() => Some(None),
                    Value::String(s) => match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                        Ok(d) => Some(Some(d)),
                        Err(_) => {
                            errors.add(&d_field, DATE_FORMAT_ERROR);
                            None
                        }
                    },
                    _ => {
                        errors.add(&d_field, DATE_FORMAT_ERROR);
                        None
                    }
                };
            }
        }

        errors.into_result()?;
        Ok(patch)
    }

    /// JSON body carrying only the fields this patch sets
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(s) = self.statut_ar {
            map.insert("statut_ar".into(), json!(s.code()));
        }
        if let Some(m) = self.montant_statut_ar {
            map.insert("montant_statut_ar".into(), json!(m));
        }
        if let Some(r) = self.reduction {
            map.insert("reduction".into(), json!(r));
        }
        for (field, value) in [
            ("tuteur_paiement", &self.tuteur_paiement),
            ("contact_tuteur_paiement", &self.contact_tuteur_paiement),
            ("adresse_tuteur_paiement", &self.adresse_tuteur_paiement),
            ("profession_tuteur_paiement", &self.profession_tuteur_paiement),
        ] {
            if let Some(v) = value {
                map.insert(field.into(), json!(v));
            }
        }
        for i in 0..INSTALLMENT_COUNT {
            if let Some(a) = self.amounts[i] {
                map.insert(format!("v{}", i + 1), json!(a));
            }
            if let Some(d) = self.dates[i] {
                map.insert(
                    format!("d{}", i + 1),
                    json!(d.map(|d| d.format("%Y-%m-%d").to_string())),
                );
            }
        }
        Value::Object(map)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the set fields onto a record
    pub fn apply(&self, rec: &mut Recouvrement) {
        if let Some(s) = self.statut_ar {
            rec.statut_ar = s;
        }
        if let Some(m) = self.montant_statut_ar {
            rec.montant_statut_ar = m;
        }
        if let Some(r) = self.reduction {
            rec.reduction = r;
        }
        if let Some(v) = &self.tuteur_paiement {
            rec.tuteur.nom = v.clone();
        }
        if let Some(v) = &self.contact_tuteur_paiement {
            rec.tuteur.contact = v.clone();
        }
        if let Some(v) = &self.adresse_tuteur_paiement {
            rec.tuteur.adresse = v.clone();
        }
        if let Some(v) = &self.profession_tuteur_paiement {
            rec.tuteur.profession = v.clone();
        }
        for (i, slot) in rec.installments.iter_mut().enumerate() {
            if let Some(a) = self.amounts[i] {
                slot.amount = a;
            }
            if let Some(d) = self.dates[i] {
                slot.date = d;
            }
        }
    }
}

const DATE_FORMAT_ERROR: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";

/// Whole, non-negative amount with an optional upper bound. Null and blank mean 0.
fn bounded_amount(errors: &mut FieldErrors, field: &str, value: &Value, max: Option<i64>) -> Option<i64> {
    let parsed = match value {
        Value::Null => Some(0),
        Value::String(s) if s.trim().is_empty() => Some(0),
        other => crate::normalize::strict_amount(other),
    };
    match parsed {
        None => {
            errors.add(field, "A valid whole number is required.");
            None
        }
        Some(n) if n < 0 => {
            errors.add(field, "Ensure this value is greater than or equal to 0.");
            None
        }
        Some(n) => match max {
            Some(m) if n > m => {
                errors.add(
                    field,
                    format!("Ensure this value is less than or equal to {}.", m),
                );
                None
            }
            _ => Some(n),
        },
    }
}
