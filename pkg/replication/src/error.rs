use core::error::{Classify, ErrorKind};
use store::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("protocol violation: {0}")]
    Protocol(String),
    #[error("replication failed: {0}")]
    Failed(String),
}

impl Classify for ReplicationError {
    fn kind(&self) -> ErrorKind {
        match self {
            ReplicationError::Io(_) => ErrorKind::Network,
            ReplicationError::Engine(e) => e.kind(),
            ReplicationError::Protocol(_) => ErrorKind::Serialisation,
            ReplicationError::Failed(_) => ErrorKind::Internal,
        }
    }
}
