//! End-to-end pipeline tests against an in-memory store and a temporary
//! directory of JSON fixtures.

use std::sync::Arc;

use sedge_core::{
  report::RunState,
  store::{FactQuery, FilingStore},
};
use sedge_store_sqlite::SqliteStore;
use serde_json::{Value, json};

use crate::pipeline::{Caches, FileOutcome, Pipeline};

async fn pipeline() -> Pipeline<SqliteStore> {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  Pipeline::new(Arc::new(store))
}

fn full_submissions_doc() -> Value {
  json!({
    "cik": "320193",
    "name": "Apple Inc.",
    "sic": "3571",
    "sicDescription": "Electronic Computers",
    "stateOfIncorporation": "CA",
    "tickers": ["AAPL"],
    "exchanges": ["Nasdaq"],
    "filings": {
      "recent": {
        "filingDate": ["2024-11-01", "2024-08-02"],
        "reportDate": ["2024-09-28", "2024-06-29"],
        "form": ["10-K", "10-Q"],
        "accessionNumber": ["0000320193-24-000123", "0000320193-24-000081"]
      }
    }
  })
}

fn companyfacts_doc() -> Value {
  json!({
    "cik": 320193,
    "entityName": "Apple Inc.",
    "facts": {
      "us-gaap": {
        "Assets": {
          "units": {
            "USD": [
              { "end": "2023-09-30", "val": 352583000000i64, "fy": 2023, "fp": "FY" },
              { "end": "2024-09-28", "val": 364980000000i64, "fy": 2024, "fp": "FY" },
              // Same (metric, end) observed again in a later frame — a
              // duplicate triple, absorbed silently.
              { "end": "2024-09-28", "val": 364980000000i64, "fy": 2025, "fp": "Q1" }
            ]
          }
        }
      }
    }
  })
}

// ─── Document-level scenarios ────────────────────────────────────────────────

#[tokio::test]
async fn full_submissions_creates_entity_identifier_and_metadata() {
  let p = pipeline().await;
  let mut caches = Caches::default();

  let outcome = p
    .ingest_document(&full_submissions_doc(), "CIK0000320193.json", &mut caches)
    .await
    .unwrap();

  let FileOutcome::Processed { entity_id, report } = outcome else {
    panic!("expected Processed, got {outcome:?}");
  };
  // Two metric arrays, two dated entries each.
  assert_eq!(report.inserted, 4);
  assert_eq!(report.skipped_duplicate, 0);

  let store = p.store();
  assert_eq!(store.list_entities(10, 0).await.unwrap().len(), 1);
  assert_eq!(store.identifiers_for(entity_id).await.unwrap().len(), 1);

  let meta = store.get_metadata(entity_id).await.unwrap().unwrap();
  assert_eq!(meta.company_name.as_deref(), Some("Apple Inc."));
  assert_eq!(meta.sic.as_deref(), Some("3571"));
  assert_eq!(meta.tickers, Some(vec!["AAPL".to_string()]));
}

#[tokio::test]
async fn flattened_doc_resolves_identity_from_filename() {
  let p = pipeline().await;
  let mut caches = Caches::default();

  // Document contents carry a different-looking number in a value array;
  // identity must come from the filename alone.
  let doc = json!({
    "filingDate": ["2024-03-01"],
    "form": ["8-K"],
    "accessionNumber": ["0000099999-24-000001"]
  });

  let outcome = p
    .ingest_document(&doc, "CIK0000012345.json", &mut caches)
    .await
    .unwrap();
  assert!(matches!(outcome, FileOutcome::Processed { .. }));

  let entity = p
    .store()
    .find_entity("sec_cik", "0000012345")
    .await
    .unwrap()
    .expect("entity resolved via filename CIK");
  assert_eq!(entity.cik.as_deref(), Some("0000012345"));
}

#[tokio::test]
async fn companyfacts_duplicates_are_counted_not_inserted() {
  let p = pipeline().await;
  let mut caches = Caches::default();

  let outcome = p
    .ingest_document(&companyfacts_doc(), "CIK0000320193.json", &mut caches)
    .await
    .unwrap();

  let FileOutcome::Processed { entity_id, report } = outcome else {
    panic!("expected Processed, got {outcome:?}");
  };
  assert_eq!(report.inserted, 2);
  assert_eq!(report.skipped_duplicate, 1);
  // Numeric values all parse; nothing unparseable.
  assert_eq!(report.skipped_unparseable, 0);

  let facts = p
    .store()
    .facts_for(entity_id, &FactQuery::default())
    .await
    .unwrap();
  assert_eq!(facts.len(), 2);
}

#[tokio::test]
async fn unknown_document_mutates_nothing() {
  let p = pipeline().await;
  let mut caches = Caches::default();

  let doc = json!({ "surprise": true, "payload": [1, 2, 3] });
  let outcome = p
    .ingest_document(&doc, "mystery.json", &mut caches)
    .await
    .unwrap();

  assert_eq!(
    outcome,
    FileOutcome::Skipped { reason: "unknown_schema".into() }
  );
  assert!(p.store().list_entities(10, 0).await.unwrap().is_empty());
  assert!(p.store().processed_file_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn flattened_doc_without_filename_cik_is_skipped() {
  let p = pipeline().await;
  let mut caches = Caches::default();

  let doc = json!({
    "filingDate": ["2024-03-01"],
    "form": ["8-K"]
  });
  let outcome = p
    .ingest_document(&doc, "recent.json", &mut caches)
    .await
    .unwrap();
  assert_eq!(
    outcome,
    FileOutcome::Skipped { reason: "missing_identifier".into() }
  );
}

#[tokio::test]
async fn unparseable_values_are_stored_and_flagged() {
  let p = pipeline().await;
  let mut caches = Caches::default();

  let doc = json!({
    "cik": 99,
    "entityName": "Oddity Corp",
    "facts": {
      "dei": {
        "EntityRegistrantName": {
          "units": { "NA": [ { "end": "2024-01-01", "val": "N/A" } ] }
        }
      }
    }
  });

  let outcome = p
    .ingest_document(&doc, "CIK0000000099.json", &mut caches)
    .await
    .unwrap();
  let FileOutcome::Processed { entity_id, report } = outcome else {
    panic!("expected Processed");
  };
  // Stored as text, counted for visibility.
  assert_eq!(report.inserted, 1);
  assert_eq!(report.skipped_unparseable, 1);

  let facts = p
    .store()
    .facts_for(entity_id, &FactQuery::default())
    .await
    .unwrap();
  assert_eq!(facts[0].value_text, "N/A");
}

#[tokio::test]
async fn invalid_observation_dates_skip_rows_not_files() {
  let p = pipeline().await;
  let mut caches = Caches::default();

  let doc = json!({
    "cik": 7,
    "entityName": "Drifty Inc",
    "facts": {
      "us-gaap": {
        "Assets": {
          "units": {
            "USD": [
              { "end": "not-a-date", "val": 1 },
              { "end": "2024-06-30", "val": 2 },
              { "val": 3 }
            ]
          }
        }
      }
    }
  });

  let outcome = p
    .ingest_document(&doc, "CIK0000000007.json", &mut caches)
    .await
    .unwrap();
  let FileOutcome::Processed { report, .. } = outcome else {
    panic!("expected Processed");
  };
  assert_eq!(report.inserted, 1);
  assert_eq!(report.skipped_no_date, 2);
}

// ─── Directory runs ──────────────────────────────────────────────────────────

fn write_fixture_tree(root: &std::path::Path) {
  let cf = root.join("companyfacts");
  let sub = root.join("submissions");
  std::fs::create_dir_all(&cf).unwrap();
  std::fs::create_dir_all(&sub).unwrap();

  std::fs::write(
    cf.join("CIK0000320193.json"),
    serde_json::to_vec(&companyfacts_doc()).unwrap(),
  )
  .unwrap();
  std::fs::write(
    sub.join("CIK0000320193.json"),
    serde_json::to_vec(&full_submissions_doc()).unwrap(),
  )
  .unwrap();
  std::fs::write(
    sub.join("unknown.json"),
    serde_json::to_vec(&json!({ "nothing": "recognisable" })).unwrap(),
  )
  .unwrap();
}

#[tokio::test]
async fn run_ingests_a_directory_tree() {
  let dir = tempfile::tempdir().unwrap();
  write_fixture_tree(dir.path());

  let p = pipeline().await;
  let status = p.run(dir.path()).await.unwrap();

  assert_eq!(status.state, RunState::Finished);
  assert_eq!(status.files_total, 3);
  assert_eq!(status.files_done, 2);
  assert_eq!(status.files_skipped, 1);
  assert_eq!(status.files_failed, 0);
  assert_eq!(status.skip_reasons.counts["unknown_schema"], 1);
  // 2 companyfacts rows + 4 submissions rows; both files reference the
  // same entity.
  assert_eq!(status.report.inserted, 6);
  assert_eq!(p.store().list_entities(10, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn second_run_is_a_no_op() {
  let dir = tempfile::tempdir().unwrap();
  write_fixture_tree(dir.path());

  let p = pipeline().await;
  let first = p.run(dir.path()).await.unwrap();
  assert_eq!(first.files_done, 2);

  let second = p.run(dir.path()).await.unwrap();
  assert_eq!(second.state, RunState::Finished);
  assert_eq!(second.files_done, 0);
  // Both processed files skip via the tracker; the unknown one re-skips on
  // classification (it is never marked processed).
  assert_eq!(second.files_skipped, 3);
  assert_eq!(second.report.inserted, 0);
  assert_eq!(second.report.skipped_duplicate, 0);

  // Still exactly the rows from the first run.
  let entity = p
    .store()
    .find_entity("sec_cik", "0000320193")
    .await
    .unwrap()
    .unwrap();
  let facts = p
    .store()
    .facts_for(entity.entity_id, &FactQuery::default())
    .await
    .unwrap();
  assert_eq!(facts.len(), 6);
}

#[tokio::test]
async fn broken_file_fails_alone_and_stays_retryable() {
  let dir = tempfile::tempdir().unwrap();
  write_fixture_tree(dir.path());
  std::fs::write(dir.path().join("companyfacts/CIK0000000001.json"), b"{ not json")
    .unwrap();

  let p = pipeline().await;
  let status = p.run(dir.path()).await.unwrap();

  assert_eq!(status.files_failed, 1);
  // The rest of the batch still processed.
  assert_eq!(status.files_done, 2);
  // The broken file left no processed marker, so a later run retries it.
  let keys = p.store().processed_file_keys().await.unwrap();
  assert!(!keys.iter().any(|k| k.contains("CIK0000000001")));
}

#[tokio::test]
async fn status_snapshots_are_published() {
  let dir = tempfile::tempdir().unwrap();
  write_fixture_tree(dir.path());

  let p = pipeline().await;
  let rx = p.subscribe();
  assert_eq!(rx.borrow().state, RunState::Idle);

  let final_status = p.run(dir.path()).await.unwrap();
  let observed = rx.borrow().clone();
  assert_eq!(observed.state, RunState::Finished);
  assert_eq!(observed.files_done, final_status.files_done);
  assert_eq!(observed.report, final_status.report);
}
