use core::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("wal volume corrupt: {0}")]
    Corrupt(String),
    #[error("wal entry not found for revision {0}")]
    NotFound(u64),
}

impl WalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalError::Io(_) => ErrorKind::Internal,
            WalError::Corrupt(_) => ErrorKind::DatabaseModified,
            WalError::NotFound(_) => ErrorKind::Client,
        }
    }
}
