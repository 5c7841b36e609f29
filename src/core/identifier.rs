//! SEPA creditor identifier (EPC AT-02) and SEPA text-field rules.
//!
//! The creditor identifier is `CC` + 2 check digits + 3-character creditor
//! business code + national identifier. The check digits are ISO 7064
//! MOD 97-10 over the national identifier followed by the country code, with
//! the business code excluded from the checksum.

use super::error::{IncassoError, ValidationError};

/// Maximum length of SEPA restricted identification fields (mandate
/// identification, end-to-end id).
pub const MAX_IDENTIFICATION_LEN: usize = 35;

/// Maximum length of unstructured remittance information.
pub const MAX_REMITTANCE_LEN: usize = 140;

/// Map a character to its base-10 representation (A=10 … Z=35, digits as-is).
fn to_base10(text: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        match c {
            '0'..='9' => out.push(c),
            'A'..='Z' => {
                let v = 10 + (c as u32 - 'A' as u32);
                out.push_str(&v.to_string());
            }
            'a'..='z' => {
                let v = 10 + (c as u32 - 'a' as u32);
                out.push_str(&v.to_string());
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Remainder of a decimal digit string modulo 97, digit by digit.
fn mod97(digits: &str) -> u32 {
    digits
        .bytes()
        .fold(0u32, |acc, b| (acc * 10 + u32::from(b - b'0')) % 97)
}

/// Check whether a SEPA creditor identifier carries valid MOD 97-10 check
/// digits. The creditor business code (positions 5-7) does not participate
/// in the checksum.
pub fn is_valid_creditor_identifier(identifier: &str) -> bool {
    if identifier.len() < 8 || identifier.len() > 35 {
        return false;
    }
    if !identifier.is_ascii() {
        return false;
    }
    let country = &identifier[..2];
    if !country.bytes().all(|b| b.is_ascii_uppercase()) {
        return false;
    }
    let check = &identifier[2..4];
    if !check.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let national = &identifier[7..];
    let Some(rearranged) = to_base10(&format!("{national}{country}{check}")) else {
        return false;
    };
    mod97(&rearranged) == 1
}

/// Derive a creditor identifier from a tax identifier (country code followed
/// by the national code, e.g. "ESB12345678") and a 3-character creditor
/// business code.
pub fn derive_creditor_identifier(
    tax_identifier: &str,
    business_code: &str,
) -> Result<String, IncassoError> {
    if tax_identifier.len() < 3 || !tax_identifier.is_ascii() {
        return Err(IncassoError::Validation(format!(
            "tax identifier '{tax_identifier}' is not usable for a creditor identifier"
        )));
    }
    if business_code.len() != 3 {
        return Err(IncassoError::Validation(format!(
            "creditor business code '{business_code}' must be 3 characters"
        )));
    }
    let country = tax_identifier[..2].to_ascii_uppercase();
    let national = tax_identifier[2..].to_ascii_uppercase();
    let rearranged = to_base10(&format!("{national}{country}00")).ok_or_else(|| {
        IncassoError::Validation(format!(
            "tax identifier '{tax_identifier}' contains characters outside A-Z0-9"
        ))
    })?;
    let check = (98 - mod97(&rearranged)) % 97;
    Ok(format!("{country}{check:02}{business_code}{national}"))
}

/// Validate a SEPA restricted identification field: `//` is forbidden, and
/// the value must not start or end with `/`.
pub fn validate_sepa_text(field: &str, value: &str, max_len: usize) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if value.chars().count() > max_len {
        errors.push(ValidationError::new(
            field,
            format!("must not exceed {max_len} characters"),
        ));
    }
    if value.contains("//") {
        errors.push(ValidationError::new(field, "must not contain '//'"));
    }
    if value.starts_with('/') || value.ends_with('/') {
        errors.push(ValidationError::new(
            field,
            "must not start or end with '/'",
        ));
    }
    errors
}

/// Normalize an identification to "absent" when empty, so uniqueness checks
/// never collide on the empty string.
pub fn normalize_identification(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
