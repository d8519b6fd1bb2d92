//! [`SqliteStore`] — the SQLite implementation of [`FilingStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use sedge_core::{
  entity::{Entity, ExternalIdentifier, IdentifierContext},
  identifier::SCHEME_SEC_CIK,
  metadata::EntityMetadata,
  metric::{FactRecord, FactRow},
  store::{FactQuery, FilingStore},
};

use crate::{
  Error, Result,
  encode::{
    RawEntity, RawFactRecord, RawIdentifier, encode_date, encode_dt,
    encode_uuid, is_unique_violation,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Sedge filing store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Closure-side helpers ────────────────────────────────────────────────────

/// Look up an entity through its identifier claim. Works on a transaction
/// too, via deref.
fn lookup_by_identifier(
  conn: &rusqlite::Connection,
  scheme: &str,
  value: &str,
) -> rusqlite::Result<Option<RawEntity>> {
  conn
    .query_row(
      "SELECT e.entity_id, e.canonical_token, e.cik, e.created_at
       FROM entities e
       JOIN entity_identifiers i ON i.entity_id = e.entity_id
       WHERE i.scheme = ?1 AND i.value = ?2",
      rusqlite::params![scheme, value],
      |row| {
        Ok(RawEntity {
          entity_id:       row.get(0)?,
          canonical_token: row.get(1)?,
          cik:             row.get(2)?,
          created_at:      row.get(3)?,
        })
      },
    )
    .optional()
}

fn lookup_identifier_row(
  conn: &rusqlite::Connection,
  scheme: &str,
  value: &str,
) -> rusqlite::Result<Option<RawIdentifier>> {
  conn
    .query_row(
      "SELECT entity_id, scheme, value, country, issuer, added_at
       FROM entity_identifiers
       WHERE scheme = ?1 AND value = ?2",
      rusqlite::params![scheme, value],
      |row| {
        Ok(RawIdentifier {
          entity_id: row.get(0)?,
          scheme:    row.get(1)?,
          value:     row.get(2)?,
          country:   row.get(3)?,
          issuer:    row.get(4)?,
          added_at:  row.get(5)?,
        })
      },
    )
    .optional()
}

/// Outcome of an attach attempt, carried out of the connection closure so
/// the domain error can be built on the async side.
enum AttachOutcome {
  Attached(RawIdentifier),
  Conflict { existing: i64 },
  NoEntity,
}

// ─── FilingStore impl ────────────────────────────────────────────────────────

impl FilingStore for SqliteStore {
  type Error = Error;

  // ── Identity resolution ───────────────────────────────────────────────────

  async fn resolve_entity(
    &self,
    scheme: &str,
    value: &str,
    ctx: IdentifierContext,
  ) -> Result<Entity> {
    let scheme = scheme.to_owned();
    let value = value.to_owned();
    // Generated up front; discarded if the identifier turns out to exist.
    // Tokens are never recomputed once stored.
    let token = encode_uuid(Uuid::new_v4());
    let now = encode_dt(Utc::now());

    let raw: RawEntity = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if let Some(raw) = lookup_by_identifier(&tx, &scheme, &value)? {
          tx.commit()?;
          return Ok(raw);
        }

        let cik = (scheme == SCHEME_SEC_CIK).then(|| value.clone());
        tx.execute(
          "INSERT INTO entities (canonical_token, cik, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![token, cik, now],
        )?;
        let entity_id = tx.last_insert_rowid();

        let claimed = tx.execute(
          "INSERT OR IGNORE INTO entity_identifiers
             (entity_id, scheme, value, country, issuer, added_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![entity_id, scheme, value, ctx.country, ctx.issuer, now],
        )?;

        if claimed == 0 {
          // Lost a creation race: another writer claimed the pair between
          // our lookup and insert. Discard our entity and re-read theirs.
          tx.rollback()?;
          return match lookup_by_identifier(conn, &scheme, &value)? {
            Some(raw) => Ok(raw),
            None => Err(rusqlite::Error::QueryReturnedNoRows.into()),
          };
        }

        tx.commit()?;
        Ok(RawEntity {
          entity_id,
          canonical_token: token.clone(),
          cik,
          created_at: now.clone(),
        })
      })
      .await?;

    raw.into_entity()
  }

  async fn attach_identifier(
    &self,
    entity_id: i64,
    scheme: &str,
    value: &str,
    ctx: IdentifierContext,
  ) -> Result<ExternalIdentifier> {
    let scheme_owned = scheme.to_owned();
    let value_owned = value.to_owned();
    let now = encode_dt(Utc::now());

    let outcome: AttachOutcome = self
      .conn
      .call(move |conn| {
        let (scheme, value) = (scheme_owned, value_owned);
        let tx = conn.transaction()?;

        if let Some(existing) = lookup_identifier_row(&tx, &scheme, &value)? {
          if existing.entity_id != entity_id {
            tx.rollback()?;
            return Ok(AttachOutcome::Conflict {
              existing: existing.entity_id,
            });
          }
          // Same claim re-observed: backfill context only where null.
          tx.execute(
            "UPDATE entity_identifiers
             SET country = COALESCE(country, ?1),
                 issuer  = COALESCE(issuer, ?2)
             WHERE scheme = ?3 AND value = ?4",
            rusqlite::params![ctx.country, ctx.issuer, scheme, value],
          )?;
          let row = lookup_identifier_row(&tx, &scheme, &value)?
            .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
          tx.commit()?;
          return Ok(AttachOutcome::Attached(row));
        }

        let entity_exists: bool = tx
          .query_row(
            "SELECT 1 FROM entities WHERE entity_id = ?1",
            rusqlite::params![entity_id],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !entity_exists {
          tx.rollback()?;
          return Ok(AttachOutcome::NoEntity);
        }

        match tx.execute(
          "INSERT INTO entity_identifiers
             (entity_id, scheme, value, country, issuer, added_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![entity_id, scheme, value, ctx.country, ctx.issuer, now],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            // Raced with another claim; surface whoever won.
            tx.rollback()?;
            return match lookup_identifier_row(conn, &scheme, &value)? {
              Some(row) if row.entity_id == entity_id => {
                Ok(AttachOutcome::Attached(row))
              }
              Some(row) => Ok(AttachOutcome::Conflict {
                existing: row.entity_id,
              }),
              None => Err(rusqlite::Error::QueryReturnedNoRows.into()),
            };
          }
          Err(e) => return Err(e.into()),
        }

        let row = lookup_identifier_row(&tx, &scheme, &value)?
          .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(AttachOutcome::Attached(row))
      })
      .await?;

    match outcome {
      AttachOutcome::Attached(raw) => raw.into_identifier(),
      AttachOutcome::Conflict { existing } => {
        Err(Error::Core(sedge_core::Error::IdentityConflict {
          scheme:    scheme.to_owned(),
          value:     value.to_owned(),
          existing,
          attempted: entity_id,
        }))
      }
      AttachOutcome::NoEntity => Err(Error::EntityNotFound(entity_id)),
    }
  }

  async fn find_entity(&self, scheme: &str, value: &str) -> Result<Option<Entity>> {
    let scheme = scheme.to_owned();
    let value = value.to_owned();

    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| Ok(lookup_by_identifier(conn, &scheme, &value)?))
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn get_entity(&self, entity_id: i64) -> Result<Option<Entity>> {
    let raw: Option<RawEntity> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT entity_id, canonical_token, cik, created_at
               FROM entities WHERE entity_id = ?1",
              rusqlite::params![entity_id],
              |row| {
                Ok(RawEntity {
                  entity_id:       row.get(0)?,
                  canonical_token: row.get(1)?,
                  cik:             row.get(2)?,
                  created_at:      row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEntity::into_entity).transpose()
  }

  async fn list_entities(&self, limit: usize, offset: usize) -> Result<Vec<Entity>> {
    let limit = limit as i64;
    let offset = offset as i64;

    let raws: Vec<RawEntity> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entity_id, canonical_token, cik, created_at
           FROM entities ORDER BY entity_id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit, offset], |row| {
            Ok(RawEntity {
              entity_id:       row.get(0)?,
              canonical_token: row.get(1)?,
              cik:             row.get(2)?,
              created_at:      row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntity::into_entity).collect()
  }

  async fn identifiers_for(&self, entity_id: i64) -> Result<Vec<ExternalIdentifier>> {
    let raws: Vec<RawIdentifier> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT entity_id, scheme, value, country, issuer, added_at
           FROM entity_identifiers WHERE entity_id = ?1
           ORDER BY scheme, value",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![entity_id], |row| {
            Ok(RawIdentifier {
              entity_id: row.get(0)?,
              scheme:    row.get(1)?,
              value:     row.get(2)?,
              country:   row.get(3)?,
              issuer:    row.get(4)?,
              added_at:  row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIdentifier::into_identifier).collect()
  }

  // ── Metadata ──────────────────────────────────────────────────────────────

  async fn merge_metadata(&self, entity_id: i64, patch: &EntityMetadata) -> Result<()> {
    // Read-modify-write on the JSON document. The merge policy lives on the
    // typed struct in sedge-core; the pipeline is the single writer.
    let current: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT doc_json FROM entity_metadata WHERE entity_id = ?1",
              rusqlite::params![entity_id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    let mut meta: EntityMetadata = match &current {
      Some(json) => serde_json::from_str(json)?,
      None => EntityMetadata::default(),
    };

    if !meta.fill_from(patch) {
      return Ok(());
    }

    let doc_json = serde_json::to_string(&meta)?;
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO entity_metadata (entity_id, doc_json, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT(entity_id) DO UPDATE
             SET doc_json = excluded.doc_json,
                 updated_at = excluded.updated_at",
          rusqlite::params![entity_id, doc_json, now],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn get_metadata(&self, entity_id: i64) -> Result<Option<EntityMetadata>> {
    let json: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT doc_json FROM entity_metadata WHERE entity_id = ?1",
              rusqlite::params![entity_id],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    json
      .map(|j| serde_json::from_str(&j).map_err(Error::Json))
      .transpose()
  }

  // ── Facts ─────────────────────────────────────────────────────────────────

  async fn resolve_metric(
    &self,
    name: &str,
    source: &str,
    unit: Option<&str>,
  ) -> Result<i64> {
    let name = name.to_owned();
    let source = source.to_owned();
    let unit = unit.map(str::to_owned);
    let now = encode_dt(Utc::now());

    let id: i64 = self
      .conn
      .call(move |conn| {
        let existing: Option<(i64, Option<String>)> = conn
          .query_row(
            "SELECT metric_id, unit FROM metric_names
             WHERE name = ?1 AND source = ?2",
            rusqlite::params![name, source],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?;

        if let Some((id, current_unit)) = existing {
          // Backfill a unit observed after the metric was first seen.
          if current_unit.is_none() && unit.is_some() {
            conn.execute(
              "UPDATE metric_names SET unit = ?1 WHERE metric_id = ?2",
              rusqlite::params![unit, id],
            )?;
          }
          return Ok(id);
        }

        let inserted = conn.execute(
          "INSERT OR IGNORE INTO metric_names (name, source, unit, added_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![name, source, unit, now],
        )?;
        if inserted == 1 {
          return Ok(conn.last_insert_rowid());
        }

        // Raced: the row appeared between lookup and insert.
        let id = conn.query_row(
          "SELECT metric_id FROM metric_names WHERE name = ?1 AND source = ?2",
          rusqlite::params![name, source],
          |row| row.get(0),
        )?;
        Ok(id)
      })
      .await?;

    Ok(id)
  }

  async fn intern_date(&self, date: NaiveDate) -> Result<i64> {
    let date_str = encode_date(date);

    let id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO dates (date) VALUES (?1)",
          rusqlite::params![date_str],
        )?;
        let id = conn.query_row(
          "SELECT date_id FROM dates WHERE date = ?1",
          rusqlite::params![date_str],
          |row| row.get(0),
        )?;
        Ok(id)
      })
      .await?;

    Ok(id)
  }

  async fn insert_facts(&self, entity_id: i64, rows: Vec<FactRow>) -> Result<u64> {
    if rows.is_empty() {
      return Ok(0);
    }

    let inserted: u64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut inserted = 0u64;
        {
          let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO fact_values
               (entity_id, date_id, metric_id, value_text)
             VALUES (?1, ?2, ?3, ?4)",
          )?;
          for row in &rows {
            inserted += stmt.execute(rusqlite::params![
              entity_id,
              row.date_id,
              row.metric_id,
              row.value_text,
            ])? as u64;
          }
        }
        tx.commit()?;
        Ok(inserted)
      })
      .await?;

    Ok(inserted)
  }

  async fn facts_for(&self, entity_id: i64, query: &FactQuery) -> Result<Vec<FactRecord>> {
    use rusqlite::types::Value as SqlValue;

    let metric = query.metric.clone();
    let since = query.since.map(encode_date);
    let limit = query.limit.unwrap_or(1000) as i64;
    let offset = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawFactRecord> = self
      .conn
      .call(move |conn| {
        let mut conds = vec!["f.entity_id = ?".to_string()];
        let mut binds: Vec<SqlValue> = vec![SqlValue::Integer(entity_id)];

        if let Some(m) = metric {
          conds.push("m.name = ?".to_string());
          binds.push(SqlValue::Text(m));
        }
        if let Some(s) = since {
          conds.push("d.date >= ?".to_string());
          binds.push(SqlValue::Text(s));
        }

        binds.push(SqlValue::Integer(limit));
        binds.push(SqlValue::Integer(offset));

        let sql = format!(
          "SELECT f.entity_id, d.date, m.name, m.source, m.unit, f.value_text
           FROM fact_values f
           JOIN dates d        ON d.date_id   = f.date_id
           JOIN metric_names m ON m.metric_id = f.metric_id
           WHERE {}
           ORDER BY d.date, m.name
           LIMIT ? OFFSET ?",
          conds.join(" AND ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(binds), |row| {
            Ok(RawFactRecord {
              entity_id:  row.get(0)?,
              date:       row.get(1)?,
              metric:     row.get(2)?,
              source:     row.get(3)?,
              unit:       row.get(4)?,
              value_text: row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawFactRecord::into_record).collect()
  }

  // ── Ingestion tracking ────────────────────────────────────────────────────

  async fn is_file_processed(&self, entity_id: i64, source_file: &str) -> Result<bool> {
    let source_file = source_file.to_owned();

    let processed: bool = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT 1 FROM processed_files
               WHERE entity_id = ?1 AND source_file = ?2",
              rusqlite::params![entity_id, source_file],
              |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false),
        )
      })
      .await?;

    Ok(processed)
  }

  async fn mark_file_processed(
    &self,
    entity_id: i64,
    source_file: &str,
    content_sha256: &str,
  ) -> Result<()> {
    let source_file = source_file.to_owned();
    let content_sha256 = content_sha256.to_owned();
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO processed_files
             (entity_id, source_file, content_sha256, processed_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![entity_id, source_file, content_sha256, now],
        )?;
        Ok(())
      })
      .await?;

    Ok(())
  }

  async fn processed_file_keys(&self) -> Result<Vec<String>> {
    let keys: Vec<String> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT source_file FROM processed_files")?;
        let rows = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(keys)
  }
}
