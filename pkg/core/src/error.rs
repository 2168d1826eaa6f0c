//! Shared error-taxonomy scaffolding (spec.md §7). Each crate defines its
//! own `thiserror` enum for its own failure modes; this module only defines
//! the classification every layer's errors are mapped onto so that the
//! retry combinator (pkg/store) and the HTTP/binary error surfaces
//! (pkg/net) can treat all of them uniformly.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("truncated or malformed varint")]
    Varint(#[from] crate::varint::VarintError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The abstract error kinds from spec.md §7, independent of which crate
/// raised the underlying error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller's fault; 4xx on HTTP, error frame on binary.
    Client,
    /// Transient; retried internally up to a bound, then surfaced.
    Network,
    /// A specific sub-kind that always triggers close+reopen before retry.
    DatabaseClosed,
    /// Stale snapshot; reopen and retry.
    DatabaseModified,
    /// Optimistic concurrency mismatch; retried up to a bound unless the
    /// caller pinned a specific version.
    VersionConflict,
    /// Schema strict-mode rejection.
    MissingType,
    /// Data format violation; non-retriable.
    Serialisation,
    /// Peer went away mid-exchange.
    ConnectionClosed,
    /// Pool checkout timed out / pool is at capacity.
    Busy,
    /// Anything not covered above.
    Internal,
}

impl ErrorKind {
    /// Whether the §7 propagation policy says the per-operation retry loop
    /// should catch this kind (as opposed to letting it bubble up to the
    /// connection layer to log-and-close).
    pub fn is_retriable(self) -> bool {
        matches!(
            self,
            ErrorKind::Network
                | ErrorKind::DatabaseClosed
                | ErrorKind::DatabaseModified
                | ErrorKind::VersionConflict
        )
    }

    /// HTTP status code mirroring the §7 error taxonomy table.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::Client | ErrorKind::MissingType => 400,
            ErrorKind::VersionConflict => 409,
            ErrorKind::Busy => 503,
            ErrorKind::ConnectionClosed => 499,
            _ => 500,
        }
    }
}

/// Implemented by every crate-local error enum so generic retry/HTTP-mapping
/// code can stay crate-agnostic.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}
