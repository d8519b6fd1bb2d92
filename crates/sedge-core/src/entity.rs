//! Entity — the thin envelope identifier resolution hangs facts on.
//!
//! An entity holds only identity material. Everything descriptive lives in
//! its metadata record; everything observed lives in its fact rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One company/registrant. The integer key is the only foreign key used by
/// the large fact table and never changes after creation. Entities are never
/// merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id:       i64,
  /// Opaque identity token, generated once at creation, never recomputed.
  pub canonical_token: Uuid,
  /// Legacy SEC convenience field. Not unique, never used for resolution —
  /// strict matching goes through external identifiers only.
  pub cik:             Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// A claim that `(scheme, value)` refers to `entity_id`. The pair is unique
/// across the whole store and is the sole resolution mechanism. Rows are
/// never mutated once written; a conflicting claim is a hard error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentifier {
  pub entity_id: i64,
  /// Canonical scheme name, e.g. `sec_cik`, `gleif_lei`.
  pub scheme:    String,
  /// Normalized value (see [`crate::identifier::normalize`]).
  pub value:     String,
  pub country:   Option<String>,
  pub issuer:    Option<String>,
  pub added_at:  DateTime<Utc>,
}

/// Optional context recorded alongside an identifier claim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierContext {
  pub country: Option<String>,
  pub issuer:  Option<String>,
}

impl IdentifierContext {
  /// Context for a CIK issued by the SEC.
  pub fn sec() -> Self {
    Self {
      country: Some("US".into()),
      issuer:  Some("sec".into()),
    }
  }
}
