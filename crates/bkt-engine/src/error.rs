use thiserror::Error;

/// Errors surfaced by bucket path operations.
///
/// Resolution and I/O failures abort the operation before any root is
/// published. CAS conflicts are retried internally; only exhausting the
/// retry bound surfaces as [`EngineError::ConcurrentModification`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("path not found: {0}")]
    PathNotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("no such bucket: {0}")]
    NoSuchBucket(String),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] bkt_types::TypeError),

    #[error("source read failed: {0}")]
    SourceRead(#[source] std::io::Error),

    #[error("sink write failed: {0}")]
    SinkWrite(#[source] std::io::Error),

    #[error("concurrent modification of bucket {bucket}: gave up after {attempts} attempts")]
    ConcurrentModification { bucket: String, attempts: u32 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("store error: {0}")]
    Store(#[from] bkt_store::StoreError),

    #[error("root store error: {0}")]
    Roots(#[from] bkt_roots::RootError),

    #[error("config error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
