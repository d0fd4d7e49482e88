//! Numeric key coercion and matching
//!
//! Filtered lookups on the backend are not guaranteed to apply the filter the
//! caller intended (substring or loosely typed matching), so every candidate
//! returned by a lookup is re-verified here before it is trusted. Both sides
//! are coerced to integers and compared exactly: `"12"` equals `12`, while
//! `"12a"` and `121` do not.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Largest float magnitude that converts to `i64` without loss
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0; // 2^53

/// Coerce a JSON value into an integer key.
///
/// Accepted:
/// - integer numbers
/// - floats with no fractional part (within the exactly representable range)
/// - strings holding a plain decimal integer, surrounding whitespace ignored
///
/// Everything else (`null`, booleans, arrays, objects, `"12a"`, `"1.5"`, `""`)
/// yields `None`.
pub fn coerce_key(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT)
                .map(|f| f as i64)
        }),
        Value::String(s) => parse_key(s),
        _ => None,
    }
}

/// Parse a textual key. Only optional sign and ASCII digits are accepted.
pub fn parse_key(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<i64>().ok()
}

/// Coerce a value into a strictly positive key (database ids start at 1)
pub fn positive_key(value: &Value) -> Option<i64> {
    coerce_key(value).filter(|k| *k > 0)
}

/// True when `record[field]` coerces to exactly `expected`
pub fn field_matches(record: &Value, field: &str, expected: i64) -> bool {
    record.get(field).and_then(coerce_key) == Some(expected)
}

/// The (student, class, year) triplet identifying one affectation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AffectationKey {
    pub eleve: i64,
    pub classe: i64,
    pub annee: i64,
}

impl AffectationKey {
    pub fn new(eleve: i64, classe: i64, annee: i64) -> Self {
        Self {
            eleve,
            classe,
            annee,
        }
    }

    /// Verify a lookup candidate against all three key fields
    pub fn matches(&self, candidate: &Value) -> bool {
        field_matches(candidate, "eleve_aff", self.eleve)
            && field_matches(candidate, "classe_aff", self.classe)
            && field_matches(candidate, "annee_aff", self.annee)
    }

    /// Query string used for the filtered lookup
    pub fn query_pairs(&self) -> [(&'static str, String); 3] {
        [
            ("eleve_aff", self.eleve.to_string()),
            ("classe_aff", self.classe.to_string()),
            ("annee_aff", self.annee.to_string()),
        ]
    }
}

impl std::fmt::Display for AffectationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "student {} / class {} / year {}",
            self.eleve, self.classe, self.annee
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_and_number_are_equal() {
        assert_eq!(coerce_key(&json!("12")), Some(12));
        assert_eq!(coerce_key(&json!(12)), Some(12));
        assert_eq!(coerce_key(&json!(" 12 ")), Some(12));
        assert_eq!(coerce_key(&json!(12.0)), Some(12));
    }

    #[test]
    fn test_garbage_does_not_coerce() {
        assert_eq!(coerce_key(&json!("12a")), None);
        assert_eq!(coerce_key(&json!("1.5")), None);
        assert_eq!(coerce_key(&json!(1.5)), None);
        assert_eq!(coerce_key(&json!("")), None);
        assert_eq!(coerce_key(&json!(null)), None);
        assert_eq!(coerce_key(&json!(true)), None);
        assert_eq!(coerce_key(&json!([12])), None);
        assert_eq!(coerce_key(&json!({"id": 12})), None);
    }

    #[test]
    fn test_positive_key_rejects_zero_and_negative() {
        assert_eq!(positive_key(&json!(0)), None);
        assert_eq!(positive_key(&json!("-3")), None);
        assert_eq!(positive_key(&json!("3")), Some(3));
    }

    #[test]
    fn test_triplet_match_is_exact() {
        let key = AffectationKey::new(12, 3, 1);

        let loose = json!({"eleve_aff": "12", "classe_aff": 3, "annee_aff": "1"});
        assert!(key.matches(&loose));

        let prefix = json!({"eleve_aff": 121, "classe_aff": 3, "annee_aff": 1});
        assert!(!key.matches(&prefix));

        let suffix = json!({"eleve_aff": "12a", "classe_aff": 3, "annee_aff": 1});
        assert!(!key.matches(&suffix));

        let missing = json!({"eleve_aff": 12, "classe_aff": 3});
        assert!(!key.matches(&missing));
    }
}
