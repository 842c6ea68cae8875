//! Error taxonomy for the engine.
//!
//! Every variant here corresponds to one of the abstract error kinds the
//! orchestration layer can surface. Per-file and per-symbol failures (parse
//! errors, unresolved imports) are logged and degrade gracefully — they never
//! become an `EngineError`; see `ast::parse_file` and `graph::build`.

use std::path::PathBuf;

/// Errors surfaced to callers of the engine's public API.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("cannot access {path}: {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation canceled")]
    Canceled,

    #[error("capacity exceeded: {0}")]
    Capacity(String),

    #[error("unsupported session schema version {found} (supported up to {supported})")]
    Schema { found: u32, supported: u32 },

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

/// The broad error-kind bucket a variant belongs to, matching §7's policy
/// split between orchestration-level failures that must be surfaced and
/// per-item failures that never reach this type at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    FileAccessError,
    NotFoundError,
    ConflictError,
    TimeoutError,
    CanceledError,
    CapacityError,
    SchemaError,
    InternalError,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::FileAccess { .. } => ErrorKind::FileAccessError,
            Self::NotFound(_) => ErrorKind::NotFoundError,
            Self::Conflict(_) => ErrorKind::ConflictError,
            Self::Timeout(_) => ErrorKind::TimeoutError,
            Self::Canceled => ErrorKind::CanceledError,
            Self::Capacity(_) => ErrorKind::CapacityError,
            Self::Schema { .. } => ErrorKind::SchemaError,
            Self::Internal(_) => ErrorKind::InternalError,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
