use core::error::{Classify, ErrorKind};

/// Failures an [`crate::engine::IndexEngine`] implementation can raise
/// (spec.md §6A).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("document {0} not found")]
    NotFound(u64),
    #[error("version conflict on document {0}")]
    VersionConflict(u64),
    #[error("stale snapshot, reopen required")]
    StaleSnapshot,
    #[error("database has been closed")]
    DatabaseClosed,
    #[error("malformed changeset: {0}")]
    Serialisation(String),
}

impl Classify for EngineError {
    fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::Client,
            EngineError::VersionConflict(_) => ErrorKind::VersionConflict,
            EngineError::StaleSnapshot => ErrorKind::DatabaseModified,
            EngineError::DatabaseClosed => ErrorKind::DatabaseClosed,
            EngineError::Serialisation(_) => ErrorKind::Serialisation,
        }
    }
}

/// Failures from the pool/checkout layer (spec.md §4.D).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("checkout timed out")]
    Busy,
    #[error("no endpoints given")]
    EmptyEndpoints,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal error: {0}")]
    Wal(#[from] wal::WalError),
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Busy => ErrorKind::Busy,
            StoreError::EmptyEndpoints => ErrorKind::Client,
            StoreError::Engine(e) => e.kind(),
            StoreError::Io(_) => ErrorKind::Internal,
            StoreError::Wal(_) => ErrorKind::Internal,
        }
    }
}
