//! Error types for `sedge-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The raw identifier does not match its scheme's expected shape.
  /// Callers skip the identifier attachment and continue with the rest of
  /// the document.
  #[error("invalid {scheme} identifier: {value:?}")]
  InvalidIdentifierFormat { scheme: String, value: String },

  /// An identifier pair is already claimed by a different entity. Never
  /// auto-resolved; there is no entity-merge operation in this design.
  #[error(
    "identifier {scheme}:{value} already belongs to entity {existing}, \
     refusing to attach to entity {attempted}"
  )]
  IdentityConflict {
    scheme:    String,
    value:     String,
    existing:  i64,
    attempted: i64,
  },

  #[error("entity not found: {0}")]
  EntityNotFound(i64),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
