//! Value parsing — fact values are stored as raw text and coerced to typed
//! primitives on read.
//!
//! This is a deliberate tolerance choice: upstream drift in value formatting
//! never blocks ingestion, because nothing is validated at write time beyond
//! "it fits in a string".

use serde::Serialize;

/// Cap applied when flattening arbitrary JSON values for storage.
pub const MAX_VALUE_LEN: usize = 4000;

/// A typed view of a stored text value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Primitive {
  Int(i64),
  Float(f64),
  Bool(bool),
  Text(String),
  /// The stored value was empty (or upstream sent null).
  Empty,
}

impl Primitive {
  /// True when the value did not coerce to a numeric/boolean primitive and
  /// fell through to the text branch.
  pub fn is_text(&self) -> bool { matches!(self, Self::Text(_)) }
}

/// Parse a primitive that was stored as text. Never fails: int first (so
/// `"1"` is an int, not a float), then float, then boolean literal, else the
/// original string is kept.
pub fn parse_primitive(text: &str) -> Primitive {
  let s = text.trim();
  if s.is_empty() {
    return Primitive::Empty;
  }

  if let Ok(i) = s.parse::<i64>() {
    return Primitive::Int(i);
  }
  if let Ok(f) = s.parse::<f64>() {
    return Primitive::Float(f);
  }
  if s.eq_ignore_ascii_case("true") {
    return Primitive::Bool(true);
  }
  if s.eq_ignore_ascii_case("false") {
    return Primitive::Bool(false);
  }

  Primitive::Text(s.to_string())
}

/// Flatten an arbitrary JSON value to a bounded string for the text column.
/// Scalars print plainly; lists/objects are serialized compactly; null
/// becomes the empty string. Nothing is ever dropped, only truncated.
pub fn safe_str(val: &serde_json::Value) -> String {
  use serde_json::Value;

  let s = match val {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  };

  if s.len() > MAX_VALUE_LEN {
    // Truncate on a char boundary.
    let mut end = MAX_VALUE_LEN;
    while !s.is_char_boundary(end) {
      end -= 1;
    }
    s[..end].to_string()
  } else {
    s
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn int_before_float() {
    assert_eq!(parse_primitive("42"), Primitive::Int(42));
    assert_eq!(parse_primitive("-7"), Primitive::Int(-7));
    assert_eq!(parse_primitive("3.14"), Primitive::Float(3.14));
  }

  #[test]
  fn boolean_literals() {
    assert_eq!(parse_primitive("true"), Primitive::Bool(true));
    assert_eq!(parse_primitive("False"), Primitive::Bool(false));
  }

  #[test]
  fn unparseable_falls_through_to_text() {
    assert_eq!(parse_primitive("N/A"), Primitive::Text("N/A".into()));
    assert_eq!(parse_primitive("10-K"), Primitive::Text("10-K".into()));
  }

  #[test]
  fn empty_and_whitespace() {
    assert_eq!(parse_primitive(""), Primitive::Empty);
    assert_eq!(parse_primitive("   "), Primitive::Empty);
  }

  #[test]
  fn safe_str_flattens_json() {
    assert_eq!(safe_str(&serde_json::json!(null)), "");
    assert_eq!(safe_str(&serde_json::json!(12)), "12");
    assert_eq!(safe_str(&serde_json::json!("x")), "x");
    assert_eq!(safe_str(&serde_json::json!([1, 2])), "[1,2]");
  }

  #[test]
  fn safe_str_truncates() {
    let long = "a".repeat(MAX_VALUE_LEN + 100);
    assert_eq!(safe_str(&serde_json::json!(long)).len(), MAX_VALUE_LEN);
  }
}
