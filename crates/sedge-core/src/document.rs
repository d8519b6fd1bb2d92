//! Schema classification for source documents.
//!
//! Upstream ships (at least) three shapes of per-company JSON. Instead of
//! probing attributes at point of use, every document is classified once
//! into a closed set of variants; `Unknown` is an ordinary, testable branch
//! that the pipeline skips with a logged reason.

use serde_json::Value;

/// The recognised shapes of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
  /// Submissions payload with a top-level `cik` and a nested
  /// `filings.recent` collection of parallel arrays.
  FullSubmissions,
  /// The same parallel arrays promoted to the top level, with no identity
  /// field. Identity must be inferred from the source filename.
  FlattenedRecent,
  /// Companyfacts payload: top-level `cik` plus a nested `facts` tree keyed
  /// by taxonomy and concept.
  CompanyFacts,
  /// Anything else. Skipped, never ingested.
  Unknown,
}

impl DocumentShape {
  /// Stable lower-case label used in logs and skip-reason accounting.
  pub fn label(self) -> &'static str {
    match self {
      Self::FullSubmissions => "full_submissions",
      Self::FlattenedRecent => "flattened_recent",
      Self::CompanyFacts => "companyfacts",
      Self::Unknown => "unknown",
    }
  }
}

/// Classify a parsed document. Decision order matters: the full submissions
/// shape is checked before the flattened one, and a `facts` tree only counts
/// when an identity field is also present.
pub fn classify(doc: &Value) -> DocumentShape {
  let Some(obj) = doc.as_object() else {
    return DocumentShape::Unknown;
  };

  let has_identity = obj.contains_key("cik");

  if has_identity
    && obj
      .get("filings")
      .and_then(|f| f.get("recent"))
      .is_some_and(Value::is_object)
  {
    return DocumentShape::FullSubmissions;
  }

  if !has_identity
    && !obj.contains_key("filings")
    && obj.get("filingDate").is_some_and(Value::is_array)
    && (obj.contains_key("accessionNumber") || obj.contains_key("form"))
  {
    return DocumentShape::FlattenedRecent;
  }

  if has_identity
    && obj
      .get("facts")
      .and_then(Value::as_object)
      .is_some_and(|facts| !facts.is_empty())
  {
    return DocumentShape::CompanyFacts;
  }

  DocumentShape::Unknown
}

/// A short sample of a document's top-level keys, for skip diagnostics.
pub fn top_level_keys(doc: &Value, limit: usize) -> Vec<String> {
  let mut keys: Vec<String> = doc
    .as_object()
    .map(|obj| obj.keys().cloned().collect())
    .unwrap_or_default();
  keys.sort();
  keys.truncate(limit);
  keys
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn full_submissions_shape() {
    let doc = json!({
      "cik": "320193",
      "name": "Apple Inc.",
      "filings": { "recent": { "form": ["10-K"], "filingDate": ["2024-11-01"] } }
    });
    assert_eq!(classify(&doc), DocumentShape::FullSubmissions);
  }

  #[test]
  fn flattened_recent_shape() {
    let doc = json!({
      "filingDate": ["2024-11-01", "2024-08-02"],
      "form": ["10-K", "10-Q"],
      "accessionNumber": ["0000320193-24-000123", "0000320193-24-000081"]
    });
    assert_eq!(classify(&doc), DocumentShape::FlattenedRecent);
  }

  #[test]
  fn companyfacts_shape() {
    let doc = json!({
      "cik": 320193,
      "entityName": "Apple Inc.",
      "facts": { "us-gaap": { "Assets": { "units": { "USD": [] } } } }
    });
    assert_eq!(classify(&doc), DocumentShape::CompanyFacts);
  }

  #[test]
  fn empty_facts_is_unknown() {
    let doc = json!({ "cik": 320193, "facts": {} });
    assert_eq!(classify(&doc), DocumentShape::Unknown);
  }

  #[test]
  fn non_object_is_unknown() {
    assert_eq!(classify(&json!([1, 2, 3])), DocumentShape::Unknown);
    assert_eq!(classify(&json!("nope")), DocumentShape::Unknown);
  }

  #[test]
  fn full_shape_wins_over_flattened() {
    // A document with both `filings.recent` and top-level arrays must take
    // the full-submissions branch.
    let doc = json!({
      "cik": "1",
      "filingDate": ["2024-01-01"],
      "form": ["8-K"],
      "filings": { "recent": { "form": [], "filingDate": [] } }
    });
    assert_eq!(classify(&doc), DocumentShape::FullSubmissions);
  }

  #[test]
  fn key_sampling() {
    let doc = json!({ "b": 1, "a": 2, "c": 3 });
    assert_eq!(top_level_keys(&doc, 2), vec!["a", "b"]);
  }
}
