//! Ingest reports and run-status snapshots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-file (and aggregable per-run) ingestion counters.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct IngestReport {
  /// Fact rows actually inserted.
  pub inserted:            u64,
  /// Rows skipped because the `(entity, date, metric)` triple already
  /// existed. This is the normal idempotency path, not an error.
  pub skipped_duplicate:   u64,
  /// Rows whose raw value did not coerce to a numeric/boolean primitive.
  /// These are still stored as text; the count exists for visibility only.
  pub skipped_unparseable: u64,
  /// Observations with no resolvable calendar date; nothing stored.
  pub skipped_no_date:     u64,
}

impl IngestReport {
  /// Fold another report into this one.
  pub fn absorb(&mut self, other: IngestReport) {
    self.inserted += other.inserted;
    self.skipped_duplicate += other.skipped_duplicate;
    self.skipped_unparseable += other.skipped_unparseable;
    self.skipped_no_date += other.skipped_no_date;
  }
}

/// Skip-reason accounting: counts per reason plus up to
/// [`SkipReasons::SAMPLE_LIMIT`] sample filenames each, for diagnosis
/// without re-running the batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkipReasons {
  pub counts:  BTreeMap<String, u64>,
  pub samples: BTreeMap<String, Vec<String>>,
}

impl SkipReasons {
  pub const SAMPLE_LIMIT: usize = 10;

  pub fn record(&mut self, reason: &str, filename: &str) {
    *self.counts.entry(reason.to_string()).or_default() += 1;
    let samples = self.samples.entry(reason.to_string()).or_default();
    if samples.len() < Self::SAMPLE_LIMIT {
      samples.push(filename.to_string());
    }
  }

  pub fn is_empty(&self) -> bool { self.counts.is_empty() }
}

/// Lifecycle of a pipeline run.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
  Idle,
  Running,
  Finished,
  Cancelled,
}

/// Immutable snapshot of a pipeline run, published through a single owned
/// state cell. Readers always see a consistent view; there is no ambient
/// mutable job state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
  pub state:          RunState,
  pub files_total:    u64,
  pub files_done:     u64,
  pub files_skipped:  u64,
  pub files_failed:   u64,
  pub report:         IngestReport,
  pub skip_reasons:   SkipReasons,
  pub started_at:     Option<DateTime<Utc>>,
  pub finished_at:    Option<DateTime<Utc>>,
}

impl Default for RunStatus {
  fn default() -> Self {
    Self {
      state:         RunState::Idle,
      files_total:   0,
      files_done:    0,
      files_skipped: 0,
      files_failed:  0,
      report:        IngestReport::default(),
      skip_reasons:  SkipReasons::default(),
      started_at:    None,
      finished_at:   None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn report_absorb_sums() {
    let mut total = IngestReport::default();
    total.absorb(IngestReport {
      inserted: 490,
      skipped_duplicate: 10,
      ..Default::default()
    });
    total.absorb(IngestReport {
      inserted: 5,
      skipped_unparseable: 2,
      skipped_no_date: 1,
      ..Default::default()
    });
    assert_eq!(total.inserted, 495);
    assert_eq!(total.skipped_duplicate, 10);
    assert_eq!(total.skipped_unparseable, 2);
    assert_eq!(total.skipped_no_date, 1);
  }

  #[test]
  fn skip_reason_samples_are_capped() {
    let mut reasons = SkipReasons::default();
    for i in 0..20 {
      reasons.record("unknown_schema", &format!("f{i}.json"));
    }
    assert_eq!(reasons.counts["unknown_schema"], 20);
    assert_eq!(
      reasons.samples["unknown_schema"].len(),
      SkipReasons::SAMPLE_LIMIT
    );
  }
}
