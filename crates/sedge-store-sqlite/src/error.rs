//! Error type for `sedge-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] sedge_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// Attempted to attach an identifier to an entity that does not exist.
  #[error("entity not found: {0}")]
  EntityNotFound(i64),
}

impl Error {
  /// True when this error is an identity conflict — an identifier pair
  /// already claimed by a different entity.
  pub fn is_identity_conflict(&self) -> bool {
    matches!(
      self,
      Error::Core(sedge_core::Error::IdentityConflict { .. })
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
