//! Metadata extraction from submissions payloads.
//!
//! The field vocabulary here is externally defined (EDGAR's, not ours); this
//! module maps it onto [`EntityMetadata`] and nothing more. Merge policy is
//! the store's concern.

use sedge_core::metadata::{AddressFields, EntityMetadata, FormerName};
use serde_json::Value;

use crate::identity::company_name;

fn str_field(obj: &Value, key: &str) -> Option<String> {
  let v = obj.get(key)?;
  let s = match v {
    Value::String(s) => s.trim().to_string(),
    Value::Number(n) => n.to_string(),
    _ => return None,
  };
  if s.is_empty() { None } else { Some(s) }
}

fn bool_field(obj: &Value, key: &str) -> Option<bool> {
  match obj.get(key) {
    Some(Value::Bool(b)) => Some(*b),
    // EDGAR sometimes ships these flags as 0/1.
    Some(Value::Number(n)) => n.as_i64().map(|i| i != 0),
    _ => None,
  }
}

fn string_list(obj: &Value, key: &str) -> Option<Vec<String>> {
  let arr = obj.get(key)?.as_array()?;
  let items: Vec<String> = arr
    .iter()
    .filter_map(|v| v.as_str())
    .map(str::to_string)
    .collect();
  if items.is_empty() { None } else { Some(items) }
}

/// Truncate an upstream ISO timestamp to its `YYYY-MM-DD` prefix.
fn date_prefix(s: &str) -> Option<String> {
  let s = s.trim();
  if s.is_empty() {
    return None;
  }
  match s.get(..10) {
    Some(prefix) => Some(prefix.to_string()),
    None => Some(s.to_string()),
  }
}

fn former_names(doc: &Value) -> Vec<FormerName> {
  let Some(arr) = doc.get("formerNames").and_then(Value::as_array) else {
    return Vec::new();
  };
  arr
    .iter()
    .filter_map(|fname| {
      let name = fname.get("name")?.as_str()?.trim();
      if name.is_empty() {
        return None;
      }
      Some(FormerName {
        name: name.to_string(),
        from: fname.get("from").and_then(Value::as_str).and_then(date_prefix),
        to:   fname.get("to").and_then(Value::as_str).and_then(date_prefix),
      })
    })
    .collect()
}

fn address(doc: &Value, which: &str) -> AddressFields {
  let Some(block) = doc
    .get("addresses")
    .and_then(|a| a.get(which))
    .filter(|b| b.is_object())
  else {
    return AddressFields::default();
  };
  AddressFields {
    street1:     str_field(block, "street1"),
    street2:     str_field(block, "street2"),
    city:        str_field(block, "city"),
    state:       str_field(block, "stateOrCountry"),
    postal_code: str_field(block, "zipCode"),
    country:     str_field(block, "country"),
  }
}

/// Extract every metadata field a submissions document carries. Absent
/// fields stay `None`; the fill-only-if-empty merge ignores them.
pub fn extract_metadata(doc: &Value) -> EntityMetadata {
  EntityMetadata {
    company_name: company_name(doc),

    sic:             str_field(doc, "sic"),
    sic_description: str_field(doc, "sicDescription"),

    state_of_incorporation: str_field(doc, "stateOfIncorporation"),
    state_of_incorporation_description: str_field(
      doc,
      "stateOfIncorporationDescription",
    ),
    fiscal_year_end: str_field(doc, "fiscalYearEnd"),

    filer_category: str_field(doc, "category"),
    entity_type:    str_field(doc, "entityType"),

    website:          str_field(doc, "website"),
    investor_website: str_field(doc, "investorWebsite"),
    phone:            str_field(doc, "phone"),
    ein:              str_field(doc, "ein"),
    lei:              str_field(doc, "lei"),

    entity_description: str_field(doc, "description"),
    owner_organization: str_field(doc, "ownerOrg"),

    sec_flags: str_field(doc, "flags"),
    has_insider_transactions_as_owner: bool_field(
      doc,
      "insiderTransactionForOwnerExists",
    ),
    has_insider_transactions_as_issuer: bool_field(
      doc,
      "insiderTransactionForIssuerExists",
    ),

    tickers:   string_list(doc, "tickers"),
    exchanges: string_list(doc, "exchanges"),

    former_names: former_names(doc),

    business_address: address(doc, "business"),
    mailing_address:  address(doc, "mailing"),
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn sample() -> Value {
    json!({
      "name": "Apple Inc.",
      "cik": "320193",
      "sic": "3571",
      "sicDescription": "Electronic Computers",
      "stateOfIncorporation": "CA",
      "fiscalYearEnd": "0928",
      "category": "Large accelerated filer",
      "entityType": "operating",
      "phone": "(408) 996-1010",
      "ein": "942404110",
      "insiderTransactionForIssuerExists": 1,
      "insiderTransactionForOwnerExists": 0,
      "tickers": ["AAPL"],
      "exchanges": ["Nasdaq"],
      "formerNames": [
        { "name": "APPLE COMPUTER INC", "from": "1997-07-28T00:00:00.000Z", "to": "2007-01-04T00:00:00.000Z" }
      ],
      "addresses": {
        "business": {
          "street1": "One Apple Park Way",
          "city": "Cupertino",
          "stateOrCountry": "CA",
          "zipCode": "95014"
        },
        "mailing": {
          "street1": "One Apple Park Way",
          "city": "Cupertino",
          "stateOrCountry": "CA",
          "zipCode": "95014"
        }
      }
    })
  }

  #[test]
  fn flat_fields_extracted() {
    let meta = extract_metadata(&sample());
    assert_eq!(meta.company_name.as_deref(), Some("Apple Inc."));
    assert_eq!(meta.sic.as_deref(), Some("3571"));
    assert_eq!(meta.fiscal_year_end.as_deref(), Some("0928"));
    assert_eq!(meta.has_insider_transactions_as_issuer, Some(true));
    assert_eq!(meta.has_insider_transactions_as_owner, Some(false));
  }

  #[test]
  fn former_name_dates_truncated() {
    let meta = extract_metadata(&sample());
    assert_eq!(meta.former_names.len(), 1);
    assert_eq!(meta.former_names[0].from.as_deref(), Some("1997-07-28"));
    assert_eq!(meta.former_names[0].to.as_deref(), Some("2007-01-04"));
  }

  #[test]
  fn addresses_extracted() {
    let meta = extract_metadata(&sample());
    assert_eq!(meta.business_address.city.as_deref(), Some("Cupertino"));
    assert_eq!(meta.business_address.postal_code.as_deref(), Some("95014"));
    assert_eq!(meta.mailing_address.state.as_deref(), Some("CA"));
  }

  #[test]
  fn companyfacts_style_doc_yields_name_only() {
    let meta = extract_metadata(&json!({ "entityName": "Apple Inc.", "cik": 320193 }));
    assert_eq!(meta.company_name.as_deref(), Some("Apple Inc."));
    assert!(meta.sic.is_none());
    assert!(meta.former_names.is_empty());
  }
}
