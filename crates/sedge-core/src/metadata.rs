//! Entity metadata — the one-to-one descriptive record per entity.
//!
//! Merge policy is fill-only-if-empty: a populated field is never
//! overwritten by a later observation, even when the new value differs.
//! Former names are the one append-mode field, deduplicated by exact match
//! of all three subfields.

use serde::{Deserialize, Serialize};

/// A historical name change. Dates are kept as `YYYY-MM-DD` strings exactly
/// as truncated from the upstream ISO timestamps, so format drift can never
/// block a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormerName {
  pub name: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub to:   Option<String>,
}

/// One postal address block (business or mailing).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressFields {
  pub street1:     Option<String>,
  pub street2:     Option<String>,
  pub city:        Option<String>,
  pub state:       Option<String>,
  pub postal_code: Option<String>,
  pub country:     Option<String>,
}

/// Descriptive record for an entity. Exactly zero or one per entity.
///
/// Every field is optional: companyfacts payloads carry only `entityName`,
/// while submissions payloads fill in the rest over time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
  pub company_name: Option<String>,

  // Industry classification.
  pub sic:             Option<String>,
  pub sic_description: Option<String>,

  // Incorporation and fiscal info.
  pub state_of_incorporation:             Option<String>,
  pub state_of_incorporation_description: Option<String>,
  pub fiscal_year_end:                    Option<String>,

  // Filer category and entity type.
  pub filer_category: Option<String>,
  pub entity_type:    Option<String>,

  // Contact information.
  pub website:          Option<String>,
  pub investor_website: Option<String>,
  pub phone:            Option<String>,
  pub ein:              Option<String>,
  pub lei:              Option<String>,

  pub entity_description:  Option<String>,
  pub owner_organization:  Option<String>,

  // Regulatory flags.
  pub sec_flags: Option<String>,
  pub has_insider_transactions_as_owner:  Option<bool>,
  pub has_insider_transactions_as_issuer: Option<bool>,

  // Trading info — set only when empty, like flat fields.
  pub tickers:   Option<Vec<String>>,
  pub exchanges: Option<Vec<String>>,

  // Append-mode: later observations add entries not already present.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub former_names: Vec<FormerName>,

  #[serde(default)]
  pub business_address: AddressFields,
  #[serde(default)]
  pub mailing_address:  AddressFields,
}

/// Fill `dst` from `src` only when `dst` is `None` (or holds an empty
/// string). Returns true when a value was written.
fn fill_str(dst: &mut Option<String>, src: &Option<String>) -> bool {
  let empty = match dst {
    None => true,
    Some(s) => s.trim().is_empty(),
  };
  if empty && let Some(v) = src
    && !v.trim().is_empty()
  {
    *dst = Some(v.clone());
    return true;
  }
  false
}

fn fill<T: Clone>(dst: &mut Option<T>, src: &Option<T>) -> bool {
  if dst.is_none() && let Some(v) = src {
    *dst = Some(v.clone());
    return true;
  }
  false
}

fn fill_address(dst: &mut AddressFields, src: &AddressFields) -> bool {
  let mut changed = false;
  changed |= fill_str(&mut dst.street1, &src.street1);
  changed |= fill_str(&mut dst.street2, &src.street2);
  changed |= fill_str(&mut dst.city, &src.city);
  changed |= fill_str(&mut dst.state, &src.state);
  changed |= fill_str(&mut dst.postal_code, &src.postal_code);
  changed |= fill_str(&mut dst.country, &src.country);
  changed
}

impl EntityMetadata {
  /// Merge `patch` into `self` under the fill-only-if-empty policy.
  /// Returns true when any field changed (useful for skipping writes).
  pub fn fill_from(&mut self, patch: &EntityMetadata) -> bool {
    let mut changed = false;

    changed |= fill_str(&mut self.company_name, &patch.company_name);
    changed |= fill_str(&mut self.sic, &patch.sic);
    changed |= fill_str(&mut self.sic_description, &patch.sic_description);
    changed |= fill_str(
      &mut self.state_of_incorporation,
      &patch.state_of_incorporation,
    );
    changed |= fill_str(
      &mut self.state_of_incorporation_description,
      &patch.state_of_incorporation_description,
    );
    changed |= fill_str(&mut self.fiscal_year_end, &patch.fiscal_year_end);
    changed |= fill_str(&mut self.filer_category, &patch.filer_category);
    changed |= fill_str(&mut self.entity_type, &patch.entity_type);
    changed |= fill_str(&mut self.website, &patch.website);
    changed |= fill_str(&mut self.investor_website, &patch.investor_website);
    changed |= fill_str(&mut self.phone, &patch.phone);
    changed |= fill_str(&mut self.ein, &patch.ein);
    changed |= fill_str(&mut self.lei, &patch.lei);
    changed |= fill_str(&mut self.entity_description, &patch.entity_description);
    changed |= fill_str(&mut self.owner_organization, &patch.owner_organization);
    changed |= fill_str(&mut self.sec_flags, &patch.sec_flags);
    changed |= fill(
      &mut self.has_insider_transactions_as_owner,
      &patch.has_insider_transactions_as_owner,
    );
    changed |= fill(
      &mut self.has_insider_transactions_as_issuer,
      &patch.has_insider_transactions_as_issuer,
    );
    changed |= fill(&mut self.tickers, &patch.tickers);
    changed |= fill(&mut self.exchanges, &patch.exchanges);

    for fname in &patch.former_names {
      if !self.former_names.contains(fname) {
        self.former_names.push(fname.clone());
        changed = true;
      }
    }

    changed |= fill_address(&mut self.business_address, &patch.business_address);
    changed |= fill_address(&mut self.mailing_address, &patch.mailing_address);

    changed
  }

  /// True when no field carries a value. Used to skip creating empty rows.
  pub fn is_empty(&self) -> bool { *self == EntityMetadata::default() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn named(name: &str) -> EntityMetadata {
    EntityMetadata {
      company_name: Some(name.into()),
      ..Default::default()
    }
  }

  #[test]
  fn populated_field_is_never_overwritten() {
    let mut meta = named("X");
    let changed = meta.fill_from(&named("Y"));
    assert!(!changed);
    assert_eq!(meta.company_name.as_deref(), Some("X"));
  }

  #[test]
  fn empty_field_is_filled() {
    let mut meta = EntityMetadata::default();
    assert!(meta.fill_from(&named("Apple Inc.")));
    assert_eq!(meta.company_name.as_deref(), Some("Apple Inc."));
  }

  #[test]
  fn whitespace_counts_as_empty() {
    let mut meta = named("   ");
    assert!(meta.fill_from(&named("Apple Inc.")));
    assert_eq!(meta.company_name.as_deref(), Some("Apple Inc."));
  }

  #[test]
  fn former_names_append_with_dedupe() {
    let old = FormerName {
      name: "Apple Computer Inc".into(),
      from: Some("1977-01-03".into()),
      to:   Some("2007-01-09".into()),
    };

    let mut meta = EntityMetadata {
      former_names: vec![old.clone()],
      ..Default::default()
    };

    // Same triple again: no change.
    let patch = EntityMetadata {
      former_names: vec![old.clone()],
      ..Default::default()
    };
    assert!(!meta.fill_from(&patch));
    assert_eq!(meta.former_names.len(), 1);

    // Same name, different dates: appended.
    let patch = EntityMetadata {
      former_names: vec![FormerName {
        from: Some("1976-04-01".into()),
        ..old.clone()
      }],
      ..Default::default()
    };
    assert!(meta.fill_from(&patch));
    assert_eq!(meta.former_names.len(), 2);
  }

  #[test]
  fn tickers_set_only_when_empty() {
    let mut meta = EntityMetadata {
      tickers: Some(vec!["AAPL".into()]),
      ..Default::default()
    };
    let patch = EntityMetadata {
      tickers: Some(vec!["APPL".into(), "AAPL34".into()]),
      ..Default::default()
    };
    assert!(!meta.fill_from(&patch));
    assert_eq!(meta.tickers, Some(vec!["AAPL".to_string()]));
  }

  #[test]
  fn addresses_fill_per_field() {
    let mut meta = EntityMetadata {
      business_address: AddressFields {
        city: Some("Cupertino".into()),
        ..Default::default()
      },
      ..Default::default()
    };
    let patch = EntityMetadata {
      business_address: AddressFields {
        city:  Some("Austin".into()),
        state: Some("CA".into()),
        ..Default::default()
      },
      ..Default::default()
    };
    assert!(meta.fill_from(&patch));
    assert_eq!(meta.business_address.city.as_deref(), Some("Cupertino"));
    assert_eq!(meta.business_address.state.as_deref(), Some("CA"));
  }
}
