//! Dashboard aggregation over affectations and recouvrements
//!
//! Pure functions over flattened rows; the server loads the rows, these
//! functions do the counting. Text filters are trimmed and compared
//! case-insensitively, and an empty filter matches everything.

use crate::ledger::{LedgerSummary, PaymentStatus};
use crate::models::{EtatAffectation, Niveau, OptionClasse};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Grouping attributes shared by every stats row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub annee_nom: Option<String>,
    pub classe_nom: Option<String>,
    pub niveau_classe: Option<String>,
    pub option_classe: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectationRow {
    pub dims: Dimensions,
    pub etat: EtatAffectation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecouvrementRow {
    pub affectation_id: Option<i64>,
    pub dims: Dimensions,
    pub frais_total: i64,
    pub montant_paye: i64,
}

fn filter_key(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
}

/// Optional filters of the recouvrement dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsFilter {
    annee: Option<String>,
    classe: Option<String>,
    niveau: Option<String>,
    option: Option<String>,
}

impl StatsFilter {
    pub fn new(
        annee: Option<&str>,
        classe: Option<&str>,
        niveau: Option<&str>,
        option: Option<&str>,
    ) -> Self {
        Self {
            annee: filter_key(annee),
            classe: filter_key(classe),
            niveau: filter_key(niveau),
            option: filter_key(option),
        }
    }

    pub fn matches(&self, dims: &Dimensions) -> bool {
        let check = |wanted: &Option<String>, actual: &Option<String>| match wanted {
            None => true,
            Some(w) => filter_key(actual.as_deref()).unwrap_or_default() == *w,
        };
        check(&self.annee, &dims.annee_nom)
            && check(&self.classe, &dims.classe_nom)
            && check(&self.niveau, &dims.niveau_classe)
            && check(&self.option, &dims.option_classe)
    }
}

/// One bar of a count chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountEntry {
    pub name: String,
    pub total: i64,
}

fn to_entries(map: BTreeMap<String, i64>) -> Vec<CountEntry> {
    map.into_iter()
        .map(|(name, total)| CountEntry { name, total })
        .collect()
}

fn label_or_na(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .unwrap_or("N/A")
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffectationStats {
    /// Affectations matching the year filter
    pub total: i64,
    pub distinct_classes: i64,
    /// Per-year counts, never filtered, newest year first
    pub par_annee: Vec<CountEntry>,
    pub par_etat: Vec<CountEntry>,
    pub par_niveau: Vec<CountEntry>,
    pub par_option: Vec<CountEntry>,
}

pub fn affectation_stats(rows: &[AffectationRow], annee: Option<&str>) -> AffectationStats {
    let mut par_annee: BTreeMap<String, i64> = BTreeMap::new();
    for row in rows {
        *par_annee.entry(label_or_na(&row.dims.annee_nom)).or_default() += 1;
    }

    let filter = StatsFilter::new(annee, None, None, None);
    let mut par_etat: BTreeMap<String, i64> = BTreeMap::new();
    let mut par_niveau: BTreeMap<String, i64> = BTreeMap::new();
    let mut par_option: BTreeMap<String, i64> = BTreeMap::new();
    let mut classes = BTreeSet::new();
    let mut total = 0;

    for row in rows.iter().filter(|r| filter.matches(&r.dims)) {
        total += 1;
        if let Some(c) = row.dims.classe_nom.as_deref().filter(|c| !c.is_empty()) {
            classes.insert(c.to_string());
        }
        *par_etat.entry(row.etat.label().to_string()).or_default() += 1;
        *par_niveau
            .entry(Niveau::label_for(row.dims.niveau_classe.as_deref()))
            .or_default() += 1;
        *par_option
            .entry(OptionClasse::label_for(row.dims.option_classe.as_deref()))
            .or_default() += 1;
    }

    let mut par_annee = to_entries(par_annee);
    par_annee.reverse();

    AffectationStats {
        total,
        distinct_classes: classes.len() as i64,
        par_annee,
        par_etat: to_entries(par_etat),
        par_niveau: to_entries(par_niveau),
        par_option: to_entries(par_option),
    }
}

/// Paid / remaining / due amounts for one class
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassTotals {
    pub name: String,
    pub paye: i64,
    pub restant: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub settled: i64,
    pub no_payment: i64,
    pub in_progress: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecouvrementStats {
    pub total_affectations: i64,
    /// Distinct affectations that have a recouvrement
    pub total_recouvrements: i64,
    pub total_frais: i64,
    pub total_paye: i64,
    pub total_restant: i64,
    pub pct_paye: f64,
    pub pct_restant: f64,
    pub par_classe: Vec<ClassTotals>,
    /// Recouvrements with at least one payment, per level
    pub payeurs_par_niveau: Vec<CountEntry>,
    pub payeurs_par_option: Vec<CountEntry>,
    pub statuts: StatusCounts,
    pub overpaid_count: i64,
    pub overpayment_total: i64,
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

pub fn recouvrement_stats(
    affectations: &[AffectationRow],
    recouvrements: &[RecouvrementRow],
    filter: &StatsFilter,
) -> RecouvrementStats {
    let total_affectations = affectations
        .iter()
        .filter(|a| filter.matches(&a.dims))
        .count() as i64;

    let mut dossiers = BTreeSet::new();
    let mut total_frais = 0i64;
    let mut total_paye = 0i64;
    let mut par_classe: BTreeMap<String, ClassTotals> = BTreeMap::new();
    let mut par_niveau: BTreeMap<String, i64> = BTreeMap::new();
    let mut par_option: BTreeMap<String, i64> = BTreeMap::new();
    let mut statuts = StatusCounts::default();
    let mut overpaid_count = 0;
    let mut overpayment_total = 0i64;

    for row in recouvrements.iter().filter(|r| filter.matches(&r.dims)) {
        if let Some(id) = row.affectation_id {
            dossiers.insert(id);
        }
        total_frais = total_frais.saturating_add(row.frais_total);
        total_paye = total_paye.saturating_add(row.montant_paye);

        let summary = LedgerSummary::compute(row.frais_total, [row.montant_paye]);
        let name = label_or_na(&row.dims.classe_nom);
        let class = par_classe.entry(name.clone()).or_insert(ClassTotals {
            name,
            paye: 0,
            restant: 0,
            total: 0,
        });
        class.paye += row.montant_paye;
        class.restant += summary.balance;
        class.total += row.frais_total;

        let payer = i64::from(row.montant_paye > 0);
        *par_niveau
            .entry(Niveau::label_for(row.dims.niveau_classe.as_deref()))
            .or_default() += payer;
        *par_option
            .entry(OptionClasse::label_for(row.dims.option_classe.as_deref()))
            .or_default() += payer;

        match summary.status {
            PaymentStatus::Settled => statuts.settled += 1,
            PaymentStatus::NoPayment => statuts.no_payment += 1,
            PaymentStatus::InProgress => statuts.in_progress += 1,
        }
        if summary.is_overpaid() {
            overpaid_count += 1;
            overpayment_total += summary.overpayment;
        }
    }

    let total_restant = total_frais.saturating_sub(total_paye).max(0);

    RecouvrementStats {
        total_affectations,
        total_recouvrements: dossiers.len() as i64,
        total_frais,
        total_paye,
        total_restant,
        pct_paye: percent(total_paye, total_frais),
        pct_restant: percent(total_restant, total_frais),
        par_classe: par_classe.into_values().collect(),
        payeurs_par_niveau: to_entries(par_niveau),
        payeurs_par_option: to_entries(par_option),
        statuts,
        overpaid_count,
        overpayment_total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dims(annee: &str, classe: &str, niveau: &str, option: &str) -> Dimensions {
        Dimensions {
            annee_nom: Some(annee.into()),
            classe_nom: Some(classe.into()),
            niveau_classe: Some(niveau.into()),
            option_classe: Some(option.into()),
        }
    }

    fn rec(id: i64, d: Dimensions, frais: i64, paye: i64) -> RecouvrementRow {
        RecouvrementRow {
            affectation_id: Some(id),
            dims: d,
            frais_total: frais,
            montant_paye: paye,
        }
    }

    #[test]
    fn test_filter_trims_and_ignores_case() {
        let f = StatsFilter::new(Some(" 2024-2025 "), Some("6ème a"), Some(""), None);
        assert!(f.matches(&dims("2024-2025", "6ème A", "clg", "aut")));
        assert!(!f.matches(&dims("2023-2024", "6ème A", "clg", "aut")));
        assert!(StatsFilter::default().matches(&Dimensions::default()));
    }

    #[test]
    fn test_affectation_stats_year_counts_ignore_filter() {
        let rows = vec![
            AffectationRow {
                dims: dims("2023-2024", "6A", "clg", "aut"),
                etat: EtatAffectation::Nouveau,
            },
            AffectationRow {
                dims: dims("2024-2025", "6A", "clg", "aut"),
                etat: EtatAffectation::Admis,
            },
            AffectationRow {
                dims: dims("2024-2025", "TS1", "lyc", "sm"),
                etat: EtatAffectation::Admis,
            },
        ];
        let stats = affectation_stats(&rows, Some("2024-2025"));
        assert_eq!(stats.total, 2);
        assert_eq!(stats.distinct_classes, 2);
        assert_eq!(stats.par_annee[0], CountEntry { name: "2024-2025".into(), total: 2 });
        assert_eq!(stats.par_annee[1], CountEntry { name: "2023-2024".into(), total: 1 });
        assert_eq!(stats.par_etat, vec![CountEntry { name: "Admis/e".into(), total: 2 }]);
        assert!(stats
            .par_option
            .contains(&CountEntry { name: "Sciences Mathématiques".into(), total: 1 }));
    }

    #[test]
    fn test_recouvrement_kpis() {
        let a = dims("2024-2025", "6A", "clg", "aut");
        let b = dims("2024-2025", "TS1", "lyc", "sm");
        let affectations = vec![
            AffectationRow { dims: a.clone(), etat: EtatAffectation::Nouveau },
            AffectationRow { dims: a.clone(), etat: EtatAffectation::Nouveau },
            AffectationRow { dims: b.clone(), etat: EtatAffectation::Admis },
        ];
        let recouvrements = vec![
            rec(1, a.clone(), 500_000, 300_000),
            rec(2, a.clone(), 500_000, 0),
            rec(3, b.clone(), 400_000, 450_000),
        ];

        let stats = recouvrement_stats(&affectations, &recouvrements, &StatsFilter::default());
        assert_eq!(stats.total_affectations, 3);
        assert_eq!(stats.total_recouvrements, 3);
        assert_eq!(stats.total_frais, 1_400_000);
        assert_eq!(stats.total_paye, 750_000);
        assert_eq!(stats.total_restant, 650_000);
        assert_eq!(stats.statuts, StatusCounts { settled: 1, no_payment: 1, in_progress: 1 });
        assert_eq!(stats.overpaid_count, 1);
        assert_eq!(stats.overpayment_total, 50_000);
        assert_eq!(
            stats.par_classe[0],
            ClassTotals { name: "6A".into(), paye: 300_000, restant: 700_000, total: 1_000_000 }
        );
        assert!(stats
            .payeurs_par_niveau
            .contains(&CountEntry { name: "Collège".into(), total: 1 }));

        let only_lycee = StatsFilter::new(None, None, Some("LYC"), None);
        let stats = recouvrement_stats(&affectations, &recouvrements, &only_lycee);
        assert_eq!(stats.total_affectations, 1);
        assert_eq!(stats.total_restant, 0);
        assert_eq!(stats.pct_paye, 112.5);
    }

    #[test]
    fn test_empty_inputs() {
        let stats = recouvrement_stats(&[], &[], &StatsFilter::default());
        assert_eq!(stats.total_frais, 0);
        assert_eq!(stats.pct_paye, 0.0);
        assert!(stats.par_classe.is_empty());
    }
}
