//! Identity normalization and format validation.
//!
//! Identities are employee ids: one ASCII letter followed by eight digits.
//! Normalization (trim + lower-case) happens exactly once, at the API
//! boundary; everything below this crate stores and compares the
//! normalized form.

use crate::error::CoreError;

/// Expected number of digits after the leading letter.
const DIGIT_COUNT: usize = 8;

/// Normalize a raw identity: trim, lower-case, and validate the format.
pub fn normalize(raw: &str) -> Result<String, CoreError> {
    let id = raw.trim().to_ascii_lowercase();
    validate(&id)?;
    Ok(id)
}

/// Validate an already-normalized identity.
///
/// Rules: exactly one ASCII letter followed by eight ASCII digits.
pub fn validate(id: &str) -> Result<(), CoreError> {
    let mut chars = id.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest: Vec<char> = chars.collect();
    let rest_ok = rest.len() == DIGIT_COUNT && rest.iter().all(|c| c.is_ascii_digit());

    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid identity '{id}': expected one letter followed by {DIGIT_COUNT} digits"
        )))
    }
}

/// Case-insensitive identity comparison.
///
/// Normalized identities compare equal byte-wise, but rows written before
/// normalization was applied uniformly may still carry mixed case.
pub fn eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn normalize_lowercases_and_trims() {
        assert_eq!(normalize("  A12345678 ").unwrap(), "a12345678");
    }

    #[test]
    fn normalize_accepts_already_normalized() {
        assert_eq!(normalize("z00000001").unwrap(), "z00000001");
    }

    #[test]
    fn rejects_missing_letter() {
        assert_matches!(normalize("123456789"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_short_digit_run() {
        assert_matches!(normalize("a1234567"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert_matches!(normalize("a12345678x"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn rejects_empty() {
        assert_matches!(normalize(""), Err(CoreError::Validation(_)));
    }

    #[test]
    fn eq_ignores_case() {
        assert!(eq("A12345678", "a12345678"));
        assert!(!eq("a12345678", "b12345678"));
    }
}
