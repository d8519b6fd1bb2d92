//! Identity extraction from source documents and filenames.

use sedge_core::identifier::normalize_cik;
use serde_json::Value;

/// Infer a CIK from a filename like `CIK0000320193.json` — the leading
/// digits after the `CIK` prefix, unpadded.
pub fn infer_cik_from_filename(name: &str) -> Option<String> {
  let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
  let rest = base.strip_prefix("CIK")?;
  let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
  if digits.is_empty() { None } else { Some(digits) }
}

/// The CIK carried by a document's top-level identity field (number or
/// string), normalized to 10 digits.
pub fn cik_from_document(doc: &Value) -> Option<String> {
  match doc.get("cik") {
    Some(Value::Number(n)) => normalize_cik(&n.to_string()),
    Some(Value::String(s)) => normalize_cik(s),
    _ => None,
  }
}

/// Company name from whichever field this document shape carries.
pub fn company_name(doc: &Value) -> Option<String> {
  for key in ["entityName", "name", "companyName"] {
    if let Some(Value::String(s)) = doc.get(key) {
      let s = s.trim();
      if !s.is_empty() {
        return Some(s.to_string());
      }
    }
  }
  None
}
