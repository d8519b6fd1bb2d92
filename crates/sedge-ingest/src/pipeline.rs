//! The pipeline orchestrator — walks source directories, classifies files,
//! and drives the store.
//!
//! Each discovered file moves through:
//! `Discovered → Classified → {Skipped(reason) | EntityResolved →
//! MetadataMerged/FactsIngested → MarkedProcessed}`. A failure anywhere
//! after classification aborts that file only; the batch always continues.

use std::{
  collections::{HashMap, HashSet},
  path::{Path, PathBuf},
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{NaiveDate, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::watch;

use sedge_core::{
  document::{self, DocumentShape},
  entity::IdentifierContext,
  identifier::SCHEME_SEC_CIK,
  metadata::EntityMetadata,
  metric::FactRow,
  report::{IngestReport, RunState, RunStatus},
  store::FilingStore,
  value::{parse_primitive, safe_str},
};

use crate::{
  Error, Result,
  extract::extract_metadata,
  facts::{
    SOURCE_SEC, companyfacts_observations, has_date_arrays,
    submissions_observations,
  },
  identity::{cik_from_document, company_name, infer_cik_from_filename},
};

// ─── Discovery ───────────────────────────────────────────────────────────────

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
  /// Name of the immediate parent directory (`companyfacts`, `submissions`).
  pub source: String,
  pub path:   PathBuf,
  /// Path relative to the discovery root; stable across runs.
  pub rel:    String,
}

impl SourceFile {
  /// Stable identifier used by the ingestion tracker. Includes the source
  /// folder to guard against identical filenames in different trees.
  pub fn key(&self) -> String { format!("{}:{}", self.source, self.rel) }
}

/// Recursively find `.json` files under `root`, sorted by `(source, rel)`
/// for deterministic ordering across runs.
pub fn discover_json_files(root: &Path) -> std::io::Result<Vec<SourceFile>> {
  let mut found = Vec::new();
  let mut stack = vec![root.to_path_buf()];

  while let Some(dir) = stack.pop() {
    for entry in std::fs::read_dir(&dir)? {
      let entry = entry?;
      let path = entry.path();
      if entry.file_type()?.is_dir() {
        stack.push(path);
        continue;
      }
      let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
      if !is_json {
        continue;
      }
      let source = path
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "root".to_string());
      let rel = path
        .strip_prefix(root)
        .unwrap_or(&path)
        .to_string_lossy()
        .into_owned();
      found.push(SourceFile { source, path, rel });
    }
  }

  found.sort_by(|a, b| (&a.source, &a.rel).cmp(&(&b.source, &b.rel)));
  Ok(found)
}

// ─── Per-file outcome ────────────────────────────────────────────────────────

/// Terminal state of one file's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
  /// Nothing was written; the reason feeds skip accounting.
  Skipped { reason: String },
  /// Fully ingested and marked processed.
  Processed {
    entity_id: i64,
    report:    IngestReport,
  },
}

// ─── In-run caches ───────────────────────────────────────────────────────────

/// Memoized store lookups for one run. Dates that fail to parse are cached
/// as `None` so each bad string is resolved once.
#[derive(Default)]
pub struct Caches {
  entities: HashMap<String, i64>,
  metrics:  HashMap<String, i64>,
  dates:    HashMap<String, Option<i64>>,
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Single-writer batch pipeline over a [`FilingStore`].
pub struct Pipeline<S> {
  store:  Arc<S>,
  status: watch::Sender<RunStatus>,
  cancel: Arc<AtomicBool>,
}

impl<S: FilingStore> Pipeline<S> {
  pub fn new(store: Arc<S>) -> Self {
    let (status, _) = watch::channel(RunStatus::default());
    Self {
      store,
      status,
      cancel: Arc::new(AtomicBool::new(false)),
    }
  }

  /// The underlying store, shared with read-side consumers.
  pub fn store(&self) -> &S { &self.store }

  /// Subscribe to run-status snapshots. Every update is a complete,
  /// immutable [`RunStatus`]; there is no partially-updated state to see.
  pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
    self.status.subscribe()
  }

  /// Handle for requesting a cooperative stop. Checked between files only,
  /// never mid-file.
  pub fn cancel_handle(&self) -> Arc<AtomicBool> { Arc::clone(&self.cancel) }

  /// Run the pipeline over every `.json` file under `root`.
  pub async fn run(&self, root: &Path) -> Result<RunStatus> {
    let files = discover_json_files(root)?;
    let processed: HashSet<String> = self
      .store
      .processed_file_keys()
      .await
      .map_err(Error::store)?
      .into_iter()
      .collect();

    let mut status = RunStatus {
      state: RunState::Running,
      files_total: files.len() as u64,
      started_at: Some(Utc::now()),
      ..RunStatus::default()
    };
    self.status.send_replace(status.clone());

    tracing::info!(
      files = files.len(),
      already_processed = processed.len(),
      root = %root.display(),
      "starting ingestion run"
    );

    let mut caches = Caches::default();

    for file in &files {
      if self.cancel.load(Ordering::Relaxed) {
        status.state = RunState::Cancelled;
        tracing::warn!("cancellation requested; stopping before next file");
        break;
      }

      let key = file.key();
      if processed.contains(&key) {
        status.files_skipped += 1;
        continue;
      }

      match self.ingest_file(file, &mut caches).await {
        Ok(FileOutcome::Processed { entity_id, report }) => {
          status.files_done += 1;
          status.report.absorb(report);
          tracing::info!(
            file = %key,
            entity_id,
            inserted = report.inserted,
            duplicates = report.skipped_duplicate,
            "file ingested"
          );
        }
        Ok(FileOutcome::Skipped { reason }) => {
          status.files_skipped += 1;
          status.skip_reasons.record(&reason, &file.rel);
        }
        Err(err) => {
          // Not marked processed, so the next run retries it in full.
          status.files_failed += 1;
          tracing::error!(file = %key, error = %err, "file failed; left retryable");
        }
      }

      self.status.send_replace(status.clone());
    }

    if status.state == RunState::Running {
      status.state = RunState::Finished;
    }
    status.finished_at = Some(Utc::now());
    self.status.send_replace(status.clone());

    if !status.skip_reasons.is_empty() {
      tracing::info!(reasons = ?status.skip_reasons.counts, "skip reasons");
    }
    tracing::info!(
      done = status.files_done,
      skipped = status.files_skipped,
      failed = status.files_failed,
      inserted = status.report.inserted,
      duplicates = status.report.skipped_duplicate,
      "ingestion run complete"
    );

    Ok(status)
  }

  /// Read, hash, parse, and ingest one file, marking it processed on
  /// success. Any error here leaves no processed marker.
  async fn ingest_file(
    &self,
    file: &SourceFile,
    caches: &mut Caches,
  ) -> Result<FileOutcome> {
    let bytes = tokio::fs::read(&file.path).await?;
    let digest = hex::encode(Sha256::digest(&bytes));
    let doc: Value = serde_json::from_slice(&bytes)?;

    let outcome = self.ingest_document(&doc, &file.rel, caches).await?;

    if let FileOutcome::Processed { entity_id, .. } = &outcome {
      self
        .store
        .mark_file_processed(*entity_id, &file.key(), &digest)
        .await
        .map_err(Error::store)?;
    }

    Ok(outcome)
  }

  /// Ingest one parsed document. `filename` is the identity fallback for
  /// flattened payloads. Exposed separately so document-level behavior can
  /// be exercised without a filesystem.
  pub async fn ingest_document(
    &self,
    doc: &Value,
    filename: &str,
    caches: &mut Caches,
  ) -> Result<FileOutcome> {
    let shape = document::classify(doc);

    // Classification precedes every store access: an unknown document
    // causes zero mutations.
    if shape == DocumentShape::Unknown {
      tracing::warn!(
        file = filename,
        top_keys = ?document::top_level_keys(doc, 30),
        "unknown document schema; skipping"
      );
      return Ok(FileOutcome::Skipped {
        reason: "unknown_schema".into(),
      });
    }

    let cik = match shape {
      // The flattened shape has no identity field; the filename is the
      // only source of identity.
      DocumentShape::FlattenedRecent => infer_cik_from_filename(filename)
        .and_then(|digits| sedge_core::identifier::normalize_cik(&digits)),
      _ => cik_from_document(doc).or_else(|| {
        infer_cik_from_filename(filename)
          .and_then(|digits| sedge_core::identifier::normalize_cik(&digits))
      }),
    };
    let Some(cik) = cik else {
      tracing::warn!(
        file = filename,
        top_keys = ?document::top_level_keys(doc, 30),
        "no CIK in document or filename; skipping"
      );
      return Ok(FileOutcome::Skipped {
        reason: "missing_identifier".into(),
      });
    };

    let entity_id = self.entity_id(&cik, caches).await?;

    let patch = match shape {
      DocumentShape::CompanyFacts => EntityMetadata {
        company_name: company_name(doc),
        ..EntityMetadata::default()
      },
      _ => extract_metadata(doc),
    };
    if !patch.is_empty() {
      self
        .store
        .merge_metadata(entity_id, &patch)
        .await
        .map_err(Error::store)?;
    }

    let observations = match shape {
      DocumentShape::CompanyFacts => {
        companyfacts_observations(&doc["facts"])
      }
      DocumentShape::FullSubmissions => {
        let recent = &doc["filings"]["recent"];
        if !has_date_arrays(recent) {
          return Ok(FileOutcome::Skipped {
            reason: "submissions_missing_dates".into(),
          });
        }
        submissions_observations(recent)
      }
      DocumentShape::FlattenedRecent => {
        if !has_date_arrays(doc) {
          return Ok(FileOutcome::Skipped {
            reason: "submissions_missing_dates".into(),
          });
        }
        submissions_observations(doc)
      }
      DocumentShape::Unknown => unreachable!("handled above"),
    };

    let mut report = IngestReport::default();
    let mut rows: Vec<FactRow> = Vec::with_capacity(observations.len());

    for obs in observations {
      let date_id = match &obs.date {
        Some(raw) => self.date_id(raw, caches).await?,
        None => None,
      };
      let Some(date_id) = date_id else {
        report.skipped_no_date += 1;
        continue;
      };

      let metric_id = self
        .metric_id(&obs.metric, obs.unit.as_deref(), caches)
        .await?;

      let value_text = safe_str(&obs.raw);
      // Unparseable values are stored anyway; the count is visibility only.
      if parse_primitive(&value_text).is_text() {
        report.skipped_unparseable += 1;
      }

      rows.push(FactRow {
        date_id,
        metric_id,
        value_text,
      });
    }

    let planned = rows.len() as u64;
    let inserted = self
      .store
      .insert_facts(entity_id, rows)
      .await
      .map_err(Error::store)?;
    report.inserted = inserted;
    report.skipped_duplicate = planned - inserted;

    Ok(FileOutcome::Processed { entity_id, report })
  }

  // ── Cached store lookups ──────────────────────────────────────────────────

  async fn entity_id(&self, cik: &str, caches: &mut Caches) -> Result<i64> {
    if let Some(&id) = caches.entities.get(cik) {
      return Ok(id);
    }
    let entity = self
      .store
      .resolve_entity(SCHEME_SEC_CIK, cik, IdentifierContext::sec())
      .await
      .map_err(Error::store)?;
    caches.entities.insert(cik.to_string(), entity.entity_id);
    Ok(entity.entity_id)
  }

  async fn metric_id(
    &self,
    name: &str,
    unit: Option<&str>,
    caches: &mut Caches,
  ) -> Result<i64> {
    if let Some(&id) = caches.metrics.get(name) {
      return Ok(id);
    }
    let id = self
      .store
      .resolve_metric(name, SOURCE_SEC, unit)
      .await
      .map_err(Error::store)?;
    caches.metrics.insert(name.to_string(), id);
    Ok(id)
  }

  async fn date_id(&self, raw: &str, caches: &mut Caches) -> Result<Option<i64>> {
    if let Some(&cached) = caches.dates.get(raw) {
      return Ok(cached);
    }
    let parsed = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok();
    let id = match parsed {
      Some(date) => Some(
        self
          .store
          .intern_date(date)
          .await
          .map_err(Error::store)?,
      ),
      None => {
        tracing::warn!(date = raw, "unparseable observation date");
        None
      }
    };
    caches.dates.insert(raw.to_string(), id);
    Ok(id)
  }
}
