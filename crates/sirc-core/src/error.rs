//! Crate-wide error type.
//!
//! Mirrors the error-kind taxonomy in spec.md §7: `not_found`,
//! `invalid_input`, `degraded`, `timeout`, `cancelled`, and `storage` are
//! first-class variants. Idempotency collisions (a replayed CRDT op, a
//! duplicate `create_link`) are **not** represented here — they are
//! modelled as an `Ok(false)`/no-op return, never an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SircError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input on field `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    /// A non-fatal fallback mode: the AI/embedding collaborator was
    /// unavailable, or quant params were missing. Callers should treat this
    /// as "proceeded via a degraded path", not as a hard failure.
    #[error("degraded: {0}")]
    Degraded(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SircError>;
