//! Fact walkers for the two time-series payload shapes.
//!
//! Both walkers flatten structure into a uniform observation stream; dates
//! stay raw strings here and are parsed (and possibly rejected) by the
//! pipeline, so a malformed date skips one observation rather than a file.

use serde_json::Value;

/// Source tag recorded on every metric these walkers produce.
pub const SOURCE_SEC: &str = "sec";

/// One flattened candidate observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
  /// Metric name: `"{taxonomy}.{concept}"` for companyfacts,
  /// `"submissions.recent.{field}"` for submissions.
  pub metric: String,
  pub unit:   Option<String>,
  /// Raw date string as found upstream; `None` when the payload carried no
  /// usable date for this index.
  pub date:   Option<String>,
  pub raw:    Value,
}

/// Walk a companyfacts `facts` tree:
/// `facts -> taxonomy -> concept -> units -> unit -> [points]`.
/// Points without an `end` date surface with `date: None`.
pub fn companyfacts_observations(facts: &Value) -> Vec<Observation> {
  let mut out = Vec::new();
  let Some(taxonomies) = facts.as_object() else {
    return out;
  };

  for (taxonomy, concepts) in taxonomies {
    let Some(concepts) = concepts.as_object() else {
      continue;
    };
    for (concept, concept_obj) in concepts {
      let Some(units) = concept_obj.get("units").and_then(Value::as_object) else {
        continue;
      };
      let metric = format!("{taxonomy}.{concept}");
      for (unit, points) in units {
        let Some(points) = points.as_array() else {
          continue;
        };
        for point in points {
          if !point.is_object() {
            continue;
          }
          out.push(Observation {
            metric: metric.clone(),
            unit:   Some(unit.clone()),
            date:   point
              .get("end")
              .and_then(Value::as_str)
              .map(str::to_string),
            raw:    point.get("val").cloned().unwrap_or(Value::Null),
          });
        }
      }
    }
  }
  out
}

/// Walk a submissions `recent` payload of parallel same-length arrays. Each
/// non-date array becomes a metric; each index `i` is dated by
/// `filingDate[i]`, falling back to `reportDate[i]`.
pub fn submissions_observations(recent: &Value) -> Vec<Observation> {
  let mut out = Vec::new();
  let Some(obj) = recent.as_object() else {
    return out;
  };

  let filing_dates = obj
    .get("filingDate")
    .and_then(Value::as_array)
    .map(Vec::as_slice)
    .unwrap_or(&[]);
  let report_dates = obj
    .get("reportDate")
    .and_then(Value::as_array)
    .map(Vec::as_slice)
    .unwrap_or(&[]);

  let date_for = |i: usize| -> Option<String> {
    for dates in [filing_dates, report_dates] {
      if let Some(Value::String(s)) = dates.get(i)
        && !s.is_empty()
      {
        return Some(s.clone());
      }
    }
    None
  };

  for (key, arr) in obj {
    // The date arrays themselves are not metrics.
    if key == "filingDate" || key == "reportDate" {
      continue;
    }
    let Some(arr) = arr.as_array() else {
      continue;
    };
    let metric = format!("submissions.recent.{key}");
    for (i, raw) in arr.iter().enumerate() {
      out.push(Observation {
        metric: metric.clone(),
        unit:   None,
        date:   date_for(i),
        raw:    raw.clone(),
      });
    }
  }
  out
}

/// Whether a submissions recent payload carries any date array at all. A
/// payload with none is unprocessable — nothing could ever be dated.
pub fn has_date_arrays(recent: &Value) -> bool {
  ["filingDate", "reportDate"].iter().any(|key| {
    recent
      .get(key)
      .and_then(Value::as_array)
      .is_some_and(|arr| !arr.is_empty())
  })
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn companyfacts_walk_flattens_units() {
    let facts = json!({
      "us-gaap": {
        "Assets": {
          "units": {
            "USD": [
              { "end": "2023-09-30", "val": 352583000000i64 },
              { "end": "2024-09-28", "val": 364980000000i64 }
            ]
          }
        }
      },
      "dei": {
        "EntityCommonStockSharesOutstanding": {
          "units": { "shares": [ { "end": "2024-10-18", "val": 15115823000i64 } ] }
        }
      }
    });

    let obs = companyfacts_observations(&facts);
    assert_eq!(obs.len(), 3);
    assert!(obs.iter().any(|o| o.metric == "us-gaap.Assets"
      && o.unit.as_deref() == Some("USD")
      && o.date.as_deref() == Some("2024-09-28")));
    assert!(
      obs
        .iter()
        .any(|o| o.metric == "dei.EntityCommonStockSharesOutstanding")
    );
  }

  #[test]
  fn companyfacts_point_without_end_has_no_date() {
    let facts = json!({
      "us-gaap": {
        "Assets": { "units": { "USD": [ { "val": 1 } ] } }
      }
    });
    let obs = companyfacts_observations(&facts);
    assert_eq!(obs.len(), 1);
    assert!(obs[0].date.is_none());
  }

  #[test]
  fn malformed_branches_are_skipped() {
    let facts = json!({
      "us-gaap": "not an object",
      "dei": { "Concept": { "units": { "USD": "not a list" } } }
    });
    assert!(companyfacts_observations(&facts).is_empty());
  }

  #[test]
  fn submissions_walk_dates_by_index() {
    let recent = json!({
      "filingDate": ["2024-11-01", "", "2024-05-03"],
      "reportDate": ["2024-09-28", "2024-06-29", ""],
      "form": ["10-K", "10-Q", "10-Q"],
      "accessionNumber": ["a", "b", "c"]
    });

    let obs = submissions_observations(&recent);
    // Two metric arrays, three entries each; date arrays excluded.
    assert_eq!(obs.len(), 6);

    let forms: Vec<_> = obs
      .iter()
      .filter(|o| o.metric == "submissions.recent.form")
      .collect();
    assert_eq!(forms[0].date.as_deref(), Some("2024-11-01"));
    // Empty filingDate falls back to reportDate.
    assert_eq!(forms[1].date.as_deref(), Some("2024-06-29"));
    assert_eq!(forms[2].date.as_deref(), Some("2024-05-03"));
  }

  #[test]
  fn submissions_index_beyond_dates_is_undated() {
    let recent = json!({
      "filingDate": ["2024-11-01"],
      "form": ["10-K", "10-Q"]
    });
    let obs = submissions_observations(&recent);
    assert_eq!(obs.len(), 2);
    assert!(obs[1].date.is_none());
  }

  #[test]
  fn date_array_presence() {
    assert!(has_date_arrays(&json!({ "filingDate": ["2024-01-01"] })));
    assert!(!has_date_arrays(&json!({ "filingDate": [] })));
    assert!(!has_date_arrays(&json!({ "form": ["10-K"] })));
  }
}
