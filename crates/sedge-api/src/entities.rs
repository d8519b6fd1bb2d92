//! Handlers for `/entities` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/entities` | Optional `?limit=<n>&offset=<n>` |
//! | `GET`  | `/entities/:id` | 404 if not found |
//! | `GET`  | `/entities/:id/identifiers` | All claims for the entity |
//! | `GET`  | `/entities/:id/metadata` | 404 until first observation |
//! | `GET`  | `/entities/:id/facts` | Optional `metric`, `since`, `limit`, `offset` |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use chrono::NaiveDate;
use sedge_core::{
  entity::{Entity, ExternalIdentifier},
  metadata::EntityMetadata,
  store::{FactQuery, FilingStore},
  value::{Primitive, parse_primitive},
};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

const DEFAULT_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /entities[?limit=<n>&offset=<n>]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Entity>>, ApiError>
where
  S: FilingStore,
{
  let entities = state
    .store
    .list_entities(
      params.limit.unwrap_or(DEFAULT_PAGE),
      params.offset.unwrap_or(0),
    )
    .await
    .map_err(ApiError::store)?;
  Ok(Json(entities))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /entities/:id`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Entity>, ApiError>
where
  S: FilingStore,
{
  let entity = state
    .store
    .get_entity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;
  Ok(Json(entity))
}

// ─── Identifiers ──────────────────────────────────────────────────────────────

/// `GET /entities/:id/identifiers`
pub async fn identifiers<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<ExternalIdentifier>>, ApiError>
where
  S: FilingStore,
{
  state
    .store
    .get_entity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;
  let ids = state
    .store
    .identifiers_for(id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(ids))
}

// ─── Metadata ─────────────────────────────────────────────────────────────────

/// `GET /entities/:id/metadata` — 404 until the first document for the
/// entity has been ingested.
pub async fn metadata<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<EntityMetadata>, ApiError>
where
  S: FilingStore,
{
  let meta = state
    .store
    .get_metadata(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("no metadata for entity {id}"))
    })?;
  Ok(Json(meta))
}

// ─── Facts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct FactParams {
  /// Restrict to a single metric name.
  pub metric: Option<String>,
  /// ISO date; only observations on or after it.
  pub since:  Option<NaiveDate>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// One observation with its stored text and the typed view parsed on read.
#[derive(Debug, Serialize)]
pub struct FactView {
  pub date:       NaiveDate,
  pub metric:     String,
  pub source:     String,
  pub unit:       Option<String>,
  pub value_text: String,
  pub value:      Primitive,
}

/// `GET /entities/:id/facts[?metric=...][&since=...][&limit=...][&offset=...]`
pub async fn facts<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<i64>,
  Query(params): Query<FactParams>,
) -> Result<Json<Vec<FactView>>, ApiError>
where
  S: FilingStore,
{
  state
    .store
    .get_entity(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;

  let query = FactQuery {
    metric: params.metric,
    since:  params.since,
    limit:  params.limit,
    offset: params.offset,
  };
  let records = state
    .store
    .facts_for(id, &query)
    .await
    .map_err(ApiError::store)?;

  let views = records
    .into_iter()
    .map(|r| FactView {
      value:      parse_primitive(&r.value_text),
      date:       r.date,
      metric:     r.metric,
      source:     r.source,
      unit:       r.unit,
      value_text: r.value_text,
    })
    .collect();
  Ok(Json(views))
}
