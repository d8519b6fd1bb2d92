//! Handler for the `/status` endpoint.

use axum::{Json, extract::State};
use sedge_core::{report::RunStatus, store::FilingStore};

use crate::ApiState;

/// `GET /status` — latest run-status snapshot. The snapshot is complete and
/// internally consistent; it is replaced wholesale by the pipeline, never
/// mutated in place.
pub async fn handler<S>(State(state): State<ApiState<S>>) -> Json<RunStatus>
where
  S: FilingStore,
{
  Json(state.status.borrow().clone())
}
