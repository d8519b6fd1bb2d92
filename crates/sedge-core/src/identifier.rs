//! Identifier normalization — canonical scheme names and per-scheme value
//! shaping.
//!
//! Normalization must be pure: the normalized `(scheme, value)` pair is the
//! sole deduplication key across the whole pipeline, so the same input must
//! always yield the same output.

use crate::error::{Error, Result};

/// Canonical scheme for SEC Central Index Keys.
pub const SCHEME_SEC_CIK: &str = "sec_cik";

/// Canonical scheme for GLEIF Legal Entity Identifiers.
pub const SCHEME_GLEIF_LEI: &str = "gleif_lei";

/// Fold common aliases onto canonical scheme names. Unknown schemes are
/// lower-cased and trimmed but otherwise passed through.
pub fn canonical_scheme(raw: &str) -> String {
  let s = raw.trim().to_ascii_lowercase();
  match s.as_str() {
    "cik" | "sec" | "sec-cik" | "sec_cik" => SCHEME_SEC_CIK.to_string(),
    "lei" | "gleif" | "gleif-lei" | "gleif_lei" => SCHEME_GLEIF_LEI.to_string(),
    _ => s,
  }
}

/// Normalize an identifier value for strict matching under its scheme.
///
/// - `sec_cik`: zero-padded to 10 digits; accepts integers, numeric strings,
///   and `CIK`-prefixed strings.
/// - `gleif_lei`: upper-cased.
/// - anything else: whitespace-trimmed only.
pub fn normalize(scheme: &str, raw: &str) -> Result<String> {
  let scheme = canonical_scheme(scheme);
  let value = raw.trim();
  if value.is_empty() {
    return Err(invalid(&scheme, raw));
  }

  match scheme.as_str() {
    SCHEME_SEC_CIK => normalize_cik(value).ok_or_else(|| invalid(&scheme, raw)),
    SCHEME_GLEIF_LEI => Ok(value.to_ascii_uppercase()),
    _ => Ok(value.to_string()),
  }
}

/// Normalize a CIK into 10-digit zero-padded form. Accepts bare numbers and
/// `CIK0000123456`-style strings; returns `None` when no digits survive.
pub fn normalize_cik(raw: &str) -> Option<String> {
  let s = raw.trim();
  let s = s.strip_prefix("CIK").unwrap_or(s);
  let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
  if digits.is_empty() || digits.len() > 10 {
    return None;
  }
  Some(format!("{digits:0>10}"))
}

fn invalid(scheme: &str, value: &str) -> Error {
  Error::InvalidIdentifierFormat {
    scheme: scheme.to_string(),
    value:  value.to_string(),
  }
}
