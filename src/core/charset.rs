//! ISO20022 character-set normalization for free text fields.
//!
//! The EPC basic Latin subset allows `a-z A-Z 0-9` and
//! `/ - ? : ( ) . , ' +` plus space. Banks that opt in to an extended
//! character set additionally accept their country's accented letters;
//! everything else is folded to its unaccented equivalent or replaced
//! with a space.

use super::types::CharsetMode;

const BASIC_SPECIALS: &str = "/-?:().,'+ ";

fn is_basic(c: char) -> bool {
    c.is_ascii_alphanumeric() || BASIC_SPECIALS.contains(c)
}

/// Fold a Latin letter with diacritics to its plain ASCII equivalent.
/// Returns `None` for characters with no reasonable fold.
fn fold(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => "A",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'È' | 'É' | 'Ê' | 'Ë' => "E",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' => "I",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => "O",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'ç' => "c",
        'Ç' => "C",
        'ñ' => "n",
        'Ñ' => "N",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'ø' => "o",
        'Ø' => "O",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        _ => return None,
    };
    Some(folded)
}

/// Extra characters accepted by a country's extended set.
fn country_extension(country: &str) -> &'static str {
    match country {
        "ES" => "áéíóúüñÁÉÍÓÚÜÑ",
        "PT" => "àáâãçéêíóôõúÀÁÂÃÇÉÊÍÓÔÕÚ",
        "DE" | "AT" => "äöüßÄÖÜ",
        "FR" => "àâçéèêëîïôùûüÿÀÂÇÉÈÊËÎÏÔÙÛÜ",
        "IT" => "àèéìòùÀÈÉÌÒÙ",
        _ => "",
    }
}

/// Normalize free text for substitution into a message.
///
/// Characters outside the allowed set are folded where possible and
/// replaced with a space otherwise.
pub fn normalize(text: &str, mode: &CharsetMode) -> String {
    let extension = match mode {
        CharsetMode::Ascii => "",
        CharsetMode::Extended(country) => country_extension(country),
    };
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_basic(c) || extension.contains(c) {
            out.push(c);
        } else if let Some(folded) = fold(c) {
            out.push_str(folded);
        } else {
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passes_through() {
        assert_eq!(
            normalize("Fee 2026-03 (unit 101A)", &CharsetMode::Ascii),
            "Fee 2026-03 (unit 101A)"
        );
    }

    #[test]
    fn diacritics_fold_in_ascii_mode() {
        assert_eq!(normalize("Peña Núñez", &CharsetMode::Ascii), "Pena Nunez");
        assert_eq!(normalize("Großstraße", &CharsetMode::Ascii), "Grossstrasse");
        assert_eq!(normalize("João", &CharsetMode::Ascii), "Joao");
    }

    #[test]
    fn extended_mode_keeps_national_letters() {
        let es = CharsetMode::Extended("ES".into());
        assert_eq!(normalize("Peña Núñez", &es), "Peña Núñez");
        // German letters are still folded under the Spanish set.
        assert_eq!(normalize("Straße", &es), "Strasse");
    }

    #[test]
    fn unmappable_characters_become_spaces() {
        assert_eq!(normalize("fee № 3", &CharsetMode::Ascii), "fee   3");
        assert_eq!(normalize("a&b<c>", &CharsetMode::Ascii), "a b c ");
    }
}
