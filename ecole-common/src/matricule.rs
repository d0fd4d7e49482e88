//! Student display names and registration numbers
//!
//! A matricule is built once, right after the student row gets its id:
//!
//! ```text
//! <2 letters of nom><2 letters of each prenom><DDMMYY><sexe><id><YY added>
//! CAAIBI 120312 F 42 25   (Camara Aïssatou Binta, born 12/03/2012, id 42, added 2025)
//! ```

/// Strip diacritics, drop everything that is not an ASCII letter, uppercase.
///
/// Letters without an ASCII base (e.g. `ß`, `ø`) are dropped.
pub fn fold(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_ascii_alphabetic() {
                Some(c)
            } else {
                fold_accent(c)
            }
        })
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

fn fold_accent(c: char) -> Option<char> {
    let base = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => 'A',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'Ç' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => 'C',
        'ď' => 'd',
        'Ď' => 'D',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => 'E',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'Ĝ' | 'Ğ' | 'Ġ' | 'Ģ' => 'G',
        'ì' | 'í' | 'î' | 'ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' => 'i',
        'Ì' | 'Í' | 'Î' | 'Ï' | 'Ĩ' | 'Ī' | 'Ĭ' | 'Į' | 'İ' => 'I',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'Ñ' | 'Ń' | 'Ņ' | 'Ň' => 'N',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ō' | 'ŏ' | 'ő' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ō' | 'Ŏ' | 'Ő' => 'O',
        'ŕ' | 'ř' => 'r',
        'Ŕ' | 'Ř' => 'R',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'Ś' | 'Ŝ' | 'Ş' | 'Š' => 'S',
        'ţ' | 'ť' => 't',
        'Ţ' | 'Ť' => 'T',
        'ù' | 'ú' | 'û' | 'ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => 'U',
        'ý' | 'ÿ' => 'y',
        'Ý' | 'Ÿ' => 'Y',
        'ź' | 'ż' | 'ž' => 'z',
        'Ź' | 'Ż' | 'Ž' => 'Z',
        _ => return None,
    };
    Some(base)
}

/// First two folded letters of a name part
fn initials(part: &str) -> String {
    fold(part).chars().take(2).collect()
}

/// `"Prenom1 Prenom2 Nom"`
pub fn fullname(nom: &str, prenoms: &[&str]) -> String {
    let mut parts: Vec<&str> = prenoms
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    parts.push(nom.trim());
    parts.join(" ").trim().to_string()
}

/// `DD/MM/YYYY`, zero-padded; unknown parts (0) stay as zeros
pub fn date_naissance(jour: u32, mois: u32, annee: i32) -> String {
    format!("{:02}/{:02}/{:04}", jour, mois, annee)
}

/// Inputs of [`generate`]
#[derive(Debug, Clone, Copy)]
pub struct MatriculeParts<'a> {
    pub nom: &'a str,
    pub prenoms: &'a [&'a str],
    pub jour: u32,
    pub mois: u32,
    pub annee: i32,
    pub sexe: &'a str,
    pub id: i64,
    /// Year the student was registered
    pub annee_ajout: i32,
}

pub fn generate(parts: &MatriculeParts<'_>) -> String {
    let mut letters = initials(parts.nom);
    for prenom in parts.prenoms.iter().filter(|p| !p.trim().is_empty()) {
        letters.push_str(&initials(prenom));
    }
    let year = format!("{:04}", parts.annee);
    let added = format!("{:02}", parts.annee_ajout.rem_euclid(100));
    format!(
        "{}{:02}{:02}{}{}{}{}",
        letters,
        parts.jour,
        parts.mois,
        &year[year.len() - 2..],
        parts.sexe,
        parts.id,
        added
    )
}
