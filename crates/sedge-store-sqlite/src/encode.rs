//! Row encode/decode helpers shared by the store implementation.

use chrono::{DateTime, NaiveDate, Utc};
use sedge_core::{
  entity::{Entity, ExternalIdentifier},
  metric::FactRecord,
};
use uuid::Uuid;

use crate::{Error, Result};

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn parse_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn parse_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_uuid(id: Uuid) -> String { id.simple().to_string() }

// ─── Raw row types ───────────────────────────────────────────────────────────

/// An `entities` row as read from SQLite, before type decoding.
pub struct RawEntity {
  pub entity_id:       i64,
  pub canonical_token: String,
  pub cik:             Option<String>,
  pub created_at:      String,
}

impl RawEntity {
  pub fn into_entity(self) -> Result<Entity> {
    Ok(Entity {
      entity_id:       self.entity_id,
      canonical_token: Uuid::parse_str(&self.canonical_token)?,
      cik:             self.cik,
      created_at:      parse_dt(&self.created_at)?,
    })
  }
}

pub struct RawIdentifier {
  pub entity_id: i64,
  pub scheme:    String,
  pub value:     String,
  pub country:   Option<String>,
  pub issuer:    Option<String>,
  pub added_at:  String,
}

impl RawIdentifier {
  pub fn into_identifier(self) -> Result<ExternalIdentifier> {
    Ok(ExternalIdentifier {
      entity_id: self.entity_id,
      scheme:    self.scheme,
      value:     self.value,
      country:   self.country,
      issuer:    self.issuer,
      added_at:  parse_dt(&self.added_at)?,
    })
  }
}

pub struct RawFactRecord {
  pub entity_id:  i64,
  pub date:       String,
  pub metric:     String,
  pub source:     String,
  pub unit:       Option<String>,
  pub value_text: String,
}

impl RawFactRecord {
  pub fn into_record(self) -> Result<FactRecord> {
    Ok(FactRecord {
      entity_id:  self.entity_id,
      date:       parse_date(&self.date)?,
      metric:     self.metric,
      source:     self.source,
      unit:       self.unit,
      value_text: self.value_text,
    })
  }
}

/// True when a rusqlite error is a UNIQUE-constraint violation — the
/// expected collision path for identifier and fact inserts.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
  matches!(
    err,
    rusqlite::Error::SqliteFailure(e, _)
      if e.code == rusqlite::ErrorCode::ConstraintViolation
  )
}
