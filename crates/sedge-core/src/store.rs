//! The `FilingStore` trait — the seam between ingestion and storage.
//!
//! The trait is implemented by storage backends (e.g. `sedge-store-sqlite`).
//! Higher layers (`sedge-ingest`, `sedge-api`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;

use crate::{
  entity::{Entity, ExternalIdentifier, IdentifierContext},
  metadata::EntityMetadata,
  metric::{FactRecord, FactRow},
};

/// Parameters for [`FilingStore::facts_for`].
#[derive(Debug, Clone, Default)]
pub struct FactQuery {
  /// Restrict to a specific metric name.
  pub metric: Option<String>,
  /// Restrict to observations on or after this date.
  pub since:  Option<NaiveDate>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// Abstraction over a Sedge storage backend.
///
/// Facts and identifiers are append-only; every write that can collide is
/// keyed by a unique constraint and is safe to repeat. The one operation
/// with a creation race — resolving a never-seen identifier — must be atomic
/// against the store (constraint plus re-read, not application locking).
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait FilingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Identity resolution ───────────────────────────────────────────────

  /// Resolve `(scheme, value)` to its entity, creating the entity and the
  /// identifier claim atomically when neither exists. `scheme` and `value`
  /// must already be normalized (see [`crate::identifier::normalize`]).
  ///
  /// Two concurrent resolutions of the same never-seen pair must yield the
  /// same entity.
  fn resolve_entity<'a>(
    &'a self,
    scheme: &'a str,
    value: &'a str,
    ctx: IdentifierContext,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + 'a;

  /// Attach an additional identifier claim to an existing entity.
  ///
  /// Fails with the backend's identity-conflict error when the pair is
  /// already claimed by a *different* entity; claims are never silently
  /// reassigned. Re-attaching the same pair to the same entity is a no-op
  /// (context fields are backfilled only when currently null).
  fn attach_identifier<'a>(
    &'a self,
    entity_id: i64,
    scheme: &'a str,
    value: &'a str,
    ctx: IdentifierContext,
  ) -> impl Future<Output = Result<ExternalIdentifier, Self::Error>> + Send + 'a;

  /// Look up `(scheme, value)` without creating anything.
  fn find_entity<'a>(
    &'a self,
    scheme: &'a str,
    value: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// Retrieve an entity by internal key. Returns `None` if not found.
  fn get_entity(
    &self,
    entity_id: i64,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// List entities in creation order.
  fn list_entities(
    &self,
    limit: usize,
    offset: usize,
  ) -> impl Future<Output = Result<Vec<Entity>, Self::Error>> + Send + '_;

  /// All identifier claims for an entity.
  fn identifiers_for(
    &self,
    entity_id: i64,
  ) -> impl Future<Output = Result<Vec<ExternalIdentifier>, Self::Error>> + Send + '_;

  // ── Metadata ──────────────────────────────────────────────────────────

  /// Merge metadata under the fill-only-if-empty policy, creating the
  /// record on first observation. Populated fields are never overwritten.
  fn merge_metadata<'a>(
    &'a self,
    entity_id: i64,
    patch: &'a EntityMetadata,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn get_metadata(
    &self,
    entity_id: i64,
  ) -> impl Future<Output = Result<Option<EntityMetadata>, Self::Error>> + Send + '_;

  // ── Facts ─────────────────────────────────────────────────────────────

  /// Resolve (or create) a metric id, unique per `(name, source)`. A unit
  /// observed later for a metric created without one is backfilled.
  fn resolve_metric<'a>(
    &'a self,
    name: &'a str,
    source: &'a str,
    unit: Option<&'a str>,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + 'a;

  /// Intern a calendar date, returning its id.
  fn intern_date(
    &self,
    date: NaiveDate,
  ) -> impl Future<Output = Result<i64, Self::Error>> + Send + '_;

  /// Insert fact rows for an entity, skipping rows whose
  /// `(entity, date, metric)` triple already exists. Existing rows are
  /// never modified. Returns the number actually inserted.
  fn insert_facts(
    &self,
    entity_id: i64,
    rows: Vec<FactRow>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Read observations back, joined with their metric and date.
  fn facts_for<'a>(
    &'a self,
    entity_id: i64,
    query: &'a FactQuery,
  ) -> impl Future<Output = Result<Vec<FactRecord>, Self::Error>> + Send + 'a;

  // ── Ingestion tracking ────────────────────────────────────────────────

  /// Whether `source_file` has already been fully ingested for this entity.
  fn is_file_processed<'a>(
    &'a self,
    entity_id: i64,
    source_file: &'a str,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Mark a source file fully processed. Called only after the whole file
  /// completed without fatal error; repeat calls are no-ops.
  fn mark_file_processed<'a>(
    &'a self,
    entity_id: i64,
    source_file: &'a str,
    content_sha256: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All processed source-file keys, loaded up front for fast skipping.
  fn processed_file_keys(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;
}
