//! Recouvrement balance computation
//!
//! All amounts are whole currency units. Nothing here is stored: totals and
//! balances are recomputed from the installments every time they are needed.

use crate::models::{
    FraisScolarite, Recouvrement, RecouvrementPatch, ValidationError, INSTALLMENT_COUNT,
};
use crate::normalize;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Settlement state of a recouvrement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing left to pay
    Settled,
    /// A fee is due and nothing has been paid
    NoPayment,
    InProgress,
}

impl PaymentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Settled => "Soldé",
            PaymentStatus::NoPayment => "Aucun versement",
            PaymentStatus::InProgress => "En cours",
        }
    }
}

/// Derived figures of one recouvrement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub total_fee: i64,
    pub total_paid: i64,
    /// `max(0, total_fee - total_paid)`
    pub balance: i64,
    /// Amount paid beyond the fee, 0 when not overpaid
    pub overpayment: i64,
    pub status: PaymentStatus,
}

impl LedgerSummary {
    pub fn compute(total_fee: i64, amounts: impl IntoIterator<Item = i64>) -> Self {
        let total_paid = total_paid(amounts);
        let diff = total_fee.saturating_sub(total_paid);
        let balance = diff.max(0);
        let overpayment = total_paid.saturating_sub(total_fee).max(0);

        let status = if balance == 0 {
            PaymentStatus::Settled
        } else if total_paid == 0 && total_fee > 0 {
            PaymentStatus::NoPayment
        } else {
            PaymentStatus::InProgress
        };

        Self {
            total_fee,
            total_paid,
            balance,
            overpayment,
            status,
        }
    }

    pub fn is_overpaid(&self) -> bool {
        self.overpayment > 0
    }
}

/// Sum of installment amounts, saturating instead of overflowing
pub fn total_paid(amounts: impl IntoIterator<Item = i64>) -> i64 {
    amounts.into_iter().fold(0i64, |acc, a| acc.saturating_add(a))
}

/// Apply a percentage reduction to an amount, rounding half to even.
///
/// The percentage is clamped to `[0, 100]`.
pub fn apply_reduction(base: i64, reduction_pct: i64) -> i64 {
    let pct = reduction_pct.clamp(0, 100) as i128;
    let numerator = base as i128 * (100 - pct);
    let quotient = numerator.div_euclid(100);
    let remainder = numerator.rem_euclid(100);
    let rounded = match remainder.cmp(&50) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 == 0 => quotient,
        std::cmp::Ordering::Equal => quotient + 1,
    };
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Fee and tranche amounts due after a reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedFees {
    pub frais_paiement: i64,
    pub tranches: [i64; 3],
}

impl DerivedFees {
    pub fn from_schedule(schedule: &FraisScolarite, reduction_pct: i64) -> Self {
        Self {
            frais_paiement: apply_reduction(schedule.frais_annuel, reduction_pct),
            tranches: [schedule.t1_fs, schedule.t2_fs, schedule.t3_fs]
                .map(|t| apply_reduction(t, reduction_pct)),
        }
    }
}

// ========================================
// Editing form
// ========================================

/// Fields a [`LedgerForm`] accepts
const EDITABLE: [&str; 7] = [
    "statut_ar",
    "montant_statut_ar",
    "reduction",
    "tuteur_paiement",
    "contact_tuteur_paiement",
    "adresse_tuteur_paiement",
    "profession_tuteur_paiement",
];

fn is_editable(field: &str) -> bool {
    if EDITABLE.contains(&field) {
        return true;
    }
    // Only the canonical spelling: "v2", never "v02" or "v+2"
    let slot = field
        .strip_prefix('v')
        .or_else(|| field.strip_prefix('d'))
        .and_then(|digits| {
            digits
                .parse::<usize>()
                .ok()
                .filter(|n| n.to_string() == digits)
        });
    matches!(slot, Some(n) if (1..=INSTALLMENT_COUNT).contains(&n))
}

/// Text-level editing state of one recouvrement.
///
/// Holds raw input exactly as typed; the summary is recomputed on every
/// [`LedgerForm::set_field`] with lenient parsing (unparseable amounts count
/// as 0). Strict validation only happens in [`LedgerForm::to_patch`].
#[derive(Debug, Clone)]
pub struct LedgerForm {
    recouvrement_id: i64,
    total_fee: i64,
    fields: BTreeMap<String, String>,
    original: BTreeMap<String, String>,
    summary: LedgerSummary,
}

impl LedgerForm {
    pub fn open(rec: &Recouvrement) -> Self {
        let mut fields = BTreeMap::new();
        if let Value::Object(wire) = rec.to_wire() {
            for (key, value) in wire {
                if is_editable(&key) {
                    fields.insert(key, normalize::text(&value).unwrap_or_default());
                }
            }
        }
        let total_fee = rec.frais_paiement.unwrap_or(0);
        let mut form = Self {
            recouvrement_id: rec.id,
            total_fee,
            original: fields.clone(),
            fields,
            summary: LedgerSummary::compute(total_fee, std::iter::empty::<i64>()),
        };
        form.recompute();
        form
    }

    pub fn recouvrement_id(&self) -> i64 {
        self.recouvrement_id
    }

    pub fn summary(&self) -> LedgerSummary {
        self.summary
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Update one field and recompute the summary.
    ///
    /// Returns `false` (and changes nothing) for fields the form does not edit.
    pub fn set_field(&mut self, name: &str, value: &str) -> bool {
        if !is_editable(name) {
            return false;
        }
        self.fields.insert(name.to_string(), value.to_string());
        self.recompute();
        true
    }

    fn recompute(&mut self) {
        let amounts = (1..=INSTALLMENT_COUNT).map(|n| {
            self.fields
                .get(&format!("v{}", n))
                .map(|v| normalize::lenient_amount(&json!(v)))
                .unwrap_or(0)
        });
        self.summary = LedgerSummary::compute(self.total_fee, amounts);
    }

    pub fn is_dirty(&self) -> bool {
        self.fields != self.original
    }

    /// Validated patch with the fields changed since the form was opened
    pub fn to_patch(&self) -> Result<RecouvrementPatch, ValidationError> {
        let mut body = Map::new();
        for (key, value) in &self.fields {
            if self.original.get(key) != Some(value) {
                body.insert(key.clone(), json!(value));
            }
        }
        RecouvrementPatch::from_json(&Value::Object(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Installment;
    use proptest::prelude::*;

    #[test]
    fn test_balance_example() {
        let s = LedgerSummary::compute(500_000, [200_000, 100_000]);
        assert_eq!(s.total_paid, 300_000);
        assert_eq!(s.balance, 200_000);
        assert_eq!(s.status, PaymentStatus::InProgress);
        assert!(!s.is_overpaid());
    }

    #[test]
    fn test_statuses() {
        assert_eq!(LedgerSummary::compute(100, [0; 12]).status, PaymentStatus::NoPayment);
        assert_eq!(LedgerSummary::compute(100, [100]).status, PaymentStatus::Settled);
        assert_eq!(LedgerSummary::compute(0, std::iter::empty::<i64>()).status, PaymentStatus::Settled);
    }

    #[test]
    fn test_overpayment_is_clamped_but_reported() {
        let s = LedgerSummary::compute(1_000, [800, 700]);
        assert_eq!(s.balance, 0);
        assert_eq!(s.overpayment, 500);
        assert_eq!(s.status, PaymentStatus::Settled);
        assert!(s.is_overpaid());
    }

    #[test]
    fn test_apply_reduction_rounds_half_even() {
        assert_eq!(apply_reduction(500_000, 0), 500_000);
        assert_eq!(apply_reduction(500_000, 10), 450_000);
        assert_eq!(apply_reduction(500_000, 100), 0);
        assert_eq!(apply_reduction(500_000, 150), 0);
        assert_eq!(apply_reduction(500_000, -5), 500_000);
        // 25 * 0.9 = 22.5 -> 22, 15 * 0.9 = 13.5 -> 14
        assert_eq!(apply_reduction(25, 10), 22);
        assert_eq!(apply_reduction(15, 10), 14);
    }

    #[test]
    fn test_fees_from_schedule() {
        let schedule = FraisScolarite {
            id: 1,
            annee_fs: Some(1),
            classe_fs: 3,
            frais_annuel: 600_000,
            t1_fs: 200_000,
            t2_fs: 200_000,
            t3_fs: 200_000,
        };
        let fees = DerivedFees::from_schedule(&schedule, 25);
        assert_eq!(fees.frais_paiement, 450_000);
        assert_eq!(fees.tranches, [150_000; 3]);
    }

    #[test]
    fn test_form_recomputes_on_every_change() {
        let mut rec = Recouvrement::for_affectation(1);
        rec.id = 5;
        rec.frais_paiement = Some(500_000);
        rec.installments[0] = Installment {
            amount: 200_000,
            date: None,
        };

        let mut form = LedgerForm::open(&rec);
        assert_eq!(form.summary().balance, 300_000);
        assert!(!form.is_dirty());

        assert!(form.set_field("v2", "100000"));
        assert_eq!(form.summary().total_paid, 300_000);
        assert_eq!(form.summary().balance, 200_000);

        // Partial input never fails the summary
        assert!(form.set_field("v3", "12abc"));
        assert_eq!(form.summary().total_paid, 300_000);

        assert!(!form.set_field("frais_paiement", "1"));
        assert!(!form.set_field("v13", "1"));
        assert!(form.is_dirty());
    }

    #[test]
    fn test_form_rejects_non_canonical_slot_names() {
        let mut rec = Recouvrement::for_affectation(1);
        rec.frais_paiement = Some(500_000);
        let mut form = LedgerForm::open(&rec);

        for field in ["v01", "v+2", "d01", "d+3", "v 2", "v", "d0"] {
            assert!(!form.set_field(field, "100000"), "{} accepted", field);
        }
        assert!(!form.is_dirty());
        assert_eq!(form.summary().total_paid, 0);

        assert!(form.set_field("v12", "100000"));
        assert!(form.set_field("d12", "2024-10-01"));
        assert_eq!(form.summary().total_paid, 100_000);
    }

    #[test]
    fn test_form_patch_contains_only_changes() {
        let rec = Recouvrement::for_affectation(1);
        let mut form = LedgerForm::open(&rec);
        form.set_field("v2", "100000");
        form.set_field("d2", "2024-10-01");

        let patch = form.to_patch().unwrap();
        assert_eq!(
            patch.to_json(),
            json!({"v2": 100000, "d2": "2024-10-01"})
        );

        form.set_field("v3", "12abc");
        let err = form.to_patch().unwrap_err();
        assert!(err.errors().contains("v3"));
    }

    proptest! {
        #[test]
        fn prop_balance_never_negative(
            fee in any::<i64>(),
            amounts in proptest::collection::vec(any::<i64>(), 0..=12),
        ) {
            let s = LedgerSummary::compute(fee, amounts);
            prop_assert!(s.balance >= 0);
            prop_assert!(s.overpayment >= 0);
        }

        #[test]
        fn prop_balance_plus_paid_covers_fee(
            fee in 0i64..10_000_000,
            amounts in proptest::collection::vec(0i64..1_000_000, 0..=12),
        ) {
            let s = LedgerSummary::compute(fee, amounts.clone());
            prop_assert_eq!(s.total_paid, amounts.iter().sum::<i64>());
            prop_assert_eq!(s.balance + s.total_paid - s.overpayment, fee);
        }

        #[test]
        fn prop_reduction_stays_within_base(base in 0i64..1_000_000_000, pct in -50i64..150) {
            let reduced = apply_reduction(base, pct);
            prop_assert!(reduced >= 0);
            prop_assert!(reduced <= base);
        }
    }
}
