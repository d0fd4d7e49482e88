//! Identity registry records: school years, classes, students, fee schedules

use super::{FieldErrors, ValidationError, REQUIRED};
use crate::matricule;
use serde::{Deserialize, Serialize};

// ========================================
// School years
// ========================================

/// School year such as `2024-2025`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annee {
    pub id: i64,
    pub annee_scolaire: String,
    pub debut: i64,
    pub fin: i64,
}

/// Body of `POST /annees/`
#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnee {
    pub debut: i64,
    pub fin: i64,
}

impl NewAnnee {
    /// Validate bounds and return the `debut-fin` label
    pub fn validate(&self) -> Result<String, ValidationError> {
        if self.fin <= self.debut {
            return Err(ValidationError::single(
                "non_field_errors",
                "End year must be greater than start year.",
            ));
        }
        if self.fin - self.debut != 1 {
            return Err(ValidationError::single(
                "non_field_errors",
                "Start and end must be exactly one year apart (e.g. 2023-2024).",
            ));
        }
        Ok(format!("{}-{}", self.debut, self.fin))
    }
}

// ========================================
// Classes
// ========================================

/// Schooling level of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Niveau {
    #[serde(rename = "cre")]
    Creche,
    #[serde(rename = "mat")]
    Maternelle,
    #[serde(rename = "pri")]
    Primaire,
    #[serde(rename = "clg")]
    College,
    #[serde(rename = "lyc")]
    Lycee,
    #[default]
    #[serde(rename = "aut")]
    Autre,
}

impl Niveau {
    pub const ALL: [Niveau; 6] = [
        Niveau::Creche,
        Niveau::Maternelle,
        Niveau::Primaire,
        Niveau::College,
        Niveau::Lycee,
        Niveau::Autre,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Niveau::Creche => "cre",
            Niveau::Maternelle => "mat",
            Niveau::Primaire => "pri",
            Niveau::College => "clg",
            Niveau::Lycee => "lyc",
            Niveau::Autre => "aut",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Niveau::Creche => "Crèche",
            Niveau::Maternelle => "Maternel",
            Niveau::Primaire => "Primaire",
            Niveau::College => "Collège",
            Niveau::Lycee => "Lycée",
            Niveau::Autre => "Autres",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.code() == code)
    }

    /// Display label for a stored code; unknown codes are shown as-is
    pub fn label_for(code: Option<&str>) -> String {
        let code = code.filter(|c| !c.is_empty()).unwrap_or("aut");
        Self::from_code(code)
            .map(|n| n.label().to_string())
            .unwrap_or_else(|| code.to_string())
    }
}

/// Track of a class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OptionClasse {
    #[serde(rename = "se")]
    SciencesExperimentales,
    #[serde(rename = "sm")]
    SciencesMathematiques,
    #[serde(rename = "ss")]
    SciencesSociales,
    #[serde(rename = "sc")]
    Scientifiques,
    #[serde(rename = "lit")]
    Litteraires,
    #[default]
    #[serde(rename = "aut")]
    Autre,
}

impl OptionClasse {
    pub const ALL: [OptionClasse; 6] = [
        OptionClasse::SciencesExperimentales,
        OptionClasse::SciencesMathematiques,
        OptionClasse::SciencesSociales,
        OptionClasse::Scientifiques,
        OptionClasse::Litteraires,
        OptionClasse::Autre,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            OptionClasse::SciencesExperimentales => "se",
            OptionClasse::SciencesMathematiques => "sm",
            OptionClasse::SciencesSociales => "ss",
            OptionClasse::Scientifiques => "sc",
            OptionClasse::Litteraires => "lit",
            OptionClasse::Autre => "aut",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OptionClasse::SciencesExperimentales => "Sciences Expérimentales",
            OptionClasse::SciencesMathematiques => "Sciences Mathématiques",
            OptionClasse::SciencesSociales => "Sciences Sociales",
            OptionClasse::Scientifiques => "Scientifiques",
            OptionClasse::Litteraires => "Littéraires",
            OptionClasse::Autre => "Autres",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.code() == code)
    }

    pub fn label_for(code: Option<&str>) -> String {
        let code = code.filter(|c| !c.is_empty()).unwrap_or("aut");
        Self::from_code(code)
            .map(|o| o.label().to_string())
            .unwrap_or_else(|| code.to_string())
    }
}

/// A class (e.g. `6A`, "Sixième A")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classe {
    pub id: i64,
    pub code_classe: String,
    pub lib_classe: String,
    pub niveau_classe: Niveau,
    pub option_classe: OptionClasse,
}

/// Body of `POST /classes/`
#[derive(Debug, Clone, Deserialize)]
pub struct NewClasse {
    pub code_classe: String,
    pub lib_classe: String,
    #[serde(default)]
    pub niveau_classe: Niveau,
    #[serde(default)]
    pub option_classe: OptionClasse,
}

impl NewClasse {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = FieldErrors::new();
        check_text(&mut errors, "code_classe", &self.code_classe, 10);
        check_text(&mut errors, "lib_classe", &self.lib_classe, 50);
        errors.into_result()
    }
}

// ========================================
// Students
// ========================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sexe {
    #[serde(rename = "F")]
    Feminin,
    #[serde(rename = "M")]
    Masculin,
    #[default]
    #[serde(rename = "O")]
    Autre,
}

impl Sexe {
    pub fn code(&self) -> &'static str {
        match self {
            Sexe::Feminin => "F",
            Sexe::Masculin => "M",
            Sexe::Autre => "O",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "F" => Some(Sexe::Feminin),
            "M" => Some(Sexe::Masculin),
            "O" => Some(Sexe::Autre),
            _ => None,
        }
    }
}

/// A registered student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eleve {
    pub id: i64,
    pub matricule: Option<String>,
    pub nom: String,
    pub prenom1: String,
    pub prenom2: Option<String>,
    pub prenom3: Option<String>,
    pub fullname: String,
    pub sexe: Sexe,
    pub jour_naissance: u32,
    pub mois_naissance: u32,
    pub annee_naissance: i32,
    pub date_naissance: String,
    pub lieu_naissance: Option<String>,
    pub pere: Option<String>,
    pub mere: Option<String>,
    pub dateajout: chrono::NaiveDate,
}

/// Body of `POST /eleves/`. Birth date parts use 0 for "unknown".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewEleve {
    pub nom: String,
    pub prenom1: String,
    #[serde(default)]
    pub prenom2: Option<String>,
    #[serde(default)]
    pub prenom3: Option<String>,
    #[serde(default)]
    pub sexe: Sexe,
    #[serde(default)]
    pub jour_naissance: u32,
    #[serde(default)]
    pub mois_naissance: u32,
    #[serde(default)]
    pub annee_naissance: i32,
    #[serde(default)]
    pub lieu_naissance: Option<String>,
    #[serde(default)]
    pub pere: Option<String>,
    #[serde(default)]
    pub mere: Option<String>,
}

impl NewEleve {
    /// Validate against the registry rules; `current_year` bounds the birth year
    pub fn validate(&self, current_year: i32) -> Result<(), ValidationError> {
        let mut errors = FieldErrors::new();
        check_text(&mut errors, "nom", &self.nom, 20);
        check_text(&mut errors, "prenom1", &self.prenom1, 20);
        for (field, value) in [("prenom2", &self.prenom2), ("prenom3", &self.prenom3)] {
            if let Some(v) = value {
                if v.chars().count() > 20 {
                    errors.add(field, "Ensure this field has no more than 20 characters.");
                }
            }
        }
        if self.jour_naissance > 31 {
            errors.add("jour_naissance", "Day must be between 0 and 31.");
        }
        if self.mois_naissance > 12 {
            errors.add("mois_naissance", "Month must be between 0 and 12.");
        }
        if self.annee_naissance != 0
            && !(1970..=current_year).contains(&self.annee_naissance)
        {
            errors.add(
                "annee_naissance",
                format!("Year must be 0 (unknown) or between 1970 and {}.", current_year),
            );
        }
        errors.into_result()
    }

    /// Non-empty given names in order
    pub fn prenoms(&self) -> Vec<&str> {
        std::iter::once(self.prenom1.as_str())
            .chain(self.prenom2.as_deref())
            .chain(self.prenom3.as_deref())
            .filter(|p| !p.trim().is_empty())
            .collect()
    }

    pub fn fullname(&self) -> String {
        matricule::fullname(&self.nom, &self.prenoms())
    }

    pub fn date_naissance(&self) -> String {
        matricule::date_naissance(self.jour_naissance, self.mois_naissance, self.annee_naissance)
    }
}

// ========================================
// Fee schedules
// ========================================

/// Yearly tuition for one class, split in three tranches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraisScolarite {
    pub id: i64,
    pub annee_fs: Option<i64>,
    pub classe_fs: i64,
    pub frais_annuel: i64,
    pub t1_fs: i64,
    pub t2_fs: i64,
    pub t3_fs: i64,
}

/// Body of `POST /frais/`
#[derive(Debug, Clone, Deserialize)]
pub struct NewFrais {
    #[serde(default)]
    pub annee_fs: Option<i64>,
    pub classe_fs: i64,
    #[serde(default)]
    pub frais_annuel: i64,
    #[serde(default)]
    pub t1_fs: i64,
    #[serde(default)]
    pub t2_fs: i64,
    #[serde(default)]
    pub t3_fs: i64,
}

impl NewFrais {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = FieldErrors::new();
        for (field, value) in [
            ("frais_annuel", self.frais_annuel),
            ("t1_fs", self.t1_fs),
            ("t2_fs", self.t2_fs),
            ("t3_fs", self.t3_fs),
        ] {
            if value < 0 {
                errors.add(field, "Ensure this value is greater than or equal to 0.");
            }
        }
        errors.into_result()
    }
}

fn check_text(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
    } else if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", max_len),
        );
    }
}
