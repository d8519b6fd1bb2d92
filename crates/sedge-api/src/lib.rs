//! Read-only JSON API for Sedge.
//!
//! Exposes an axum [`Router`] backed by any [`sedge_core::store::FilingStore`]
//! plus a run-status endpoint fed by the ingest pipeline's watch channel.
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sedge_api::api_router(store.clone(), pipeline.subscribe()))
//! ```

pub mod entities;
pub mod error;
pub mod status;

use std::sync::Arc;

use axum::{Router, routing::get};
use sedge_core::{report::RunStatus, store::FilingStore};
use tokio::sync::watch;

pub use error::ApiError;

/// Shared state for all handlers: the store plus the latest run-status
/// snapshot.
pub struct ApiState<S> {
  pub store:  Arc<S>,
  pub status: watch::Receiver<RunStatus>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      status: self.status.clone(),
    }
  }
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(
  store: Arc<S>,
  status: watch::Receiver<RunStatus>,
) -> Router<()>
where
  S: FilingStore + 'static,
{
  Router::new()
    // Entities
    .route("/entities", get(entities::list::<S>))
    .route("/entities/{id}", get(entities::get_one::<S>))
    .route("/entities/{id}/identifiers", get(entities::identifiers::<S>))
    .route("/entities/{id}/metadata", get(entities::metadata::<S>))
    .route("/entities/{id}/facts", get(entities::facts::<S>))
    // Run status
    .route("/status", get(status::handler::<S>))
    .with_state(ApiState { store, status })
}
