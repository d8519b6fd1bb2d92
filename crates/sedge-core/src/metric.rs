//! Metric names and fact rows — the time-series side of the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A named time-series concept, unique per `(name, source)`.
/// Companyfacts concepts are named `"{taxonomy}.{concept}"`; submissions
/// fields are named `"submissions.recent.{field}"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricName {
  pub metric_id: i64,
  pub name:      String,
  /// Originating source system, e.g. `sec`.
  pub source:    String,
  /// Unit of measure when known (`USD`, `shares`); `NA` for submissions.
  pub unit:      Option<String>,
  pub added_at:  DateTime<Utc>,
}

/// A fact row ready for insertion, with its date and metric already
/// interned. The raw value is stored exactly as flattened, never parsed at
/// write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactRow {
  pub date_id:    i64,
  pub metric_id:  i64,
  pub value_text: String,
}

/// One stored observation, read back joined with its date and metric name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRecord {
  pub entity_id:  i64,
  pub date:       NaiveDate,
  pub metric:     String,
  pub source:     String,
  pub unit:       Option<String>,
  pub value_text: String,
}
