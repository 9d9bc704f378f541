use thiserror::Error;

/// Error kinds the core surfaces to callers. Duplicate/unknown row ids are
/// deliberately *not* represented here — per the propagation policy they are
/// logged and skipped, never raised.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    /// A data source's `fetch` failed. The previous successful dataset
    /// remains cached; this is carried to the renderer as a `DataError`
    /// instruction rather than unwound through the call stack.
    #[error("data source fetch failed: {0}")]
    DataSourceFailure(String),

    /// A mid-drain transaction failure. The remaining queue is preserved.
    #[error("transaction failed: {0}")]
    TransactionFailure(String),

    /// The sort worker pool could not be used; the engine fell back to a
    /// synchronous sort on the owner thread.
    #[error("sort worker pool unavailable, falling back to synchronous sort")]
    WorkerUnavailable,

    /// A worker thread terminated mid-sort; in-flight requests on it are
    /// rejected with this error.
    #[error("sort worker terminated")]
    WorkerTerminated,

    /// Raised from a constructor, e.g. a mutable data source built without
    /// a row-id extractor.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

pub type GridResult<T> = Result<T, GridError>;
