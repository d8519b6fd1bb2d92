//! Ingestion pipeline for SEC EDGAR JSON payloads.
//!
//! Pipeline per discovered file:
//!   read + hash
//!     └─ classify()            → DocumentShape
//!          └─ extract identity → resolve entity
//!               └─ extract metadata / walk facts
//!                    └─ insert (idempotent) → mark processed
//!
//! A failed file is logged and left retryable; one bad file never stops the
//! batch.

pub mod error;
pub mod extract;
pub mod facts;
pub mod identity;
pub mod pipeline;

pub use error::{Error, Result};
pub use pipeline::{Pipeline, SourceFile, discover_json_files};

#[cfg(test)]
mod tests;
